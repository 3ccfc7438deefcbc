//! Message framing for topicmq.
//!
//! Every published message is one transport message of two or three frames:
//! an optional canonical topic, a 1-byte header carrying the protocol
//! version and content type, and the payload.
//!
//! This crate is pure: no sockets, no threads. Sessions use it on both the
//! send and the receive path.

pub mod content;
pub mod envelope;
pub mod error;
pub mod header;
pub mod message;
pub mod topic;

pub use content::{ContentType, RAW, RESERVED_AML, RESERVED_JSON, STRUCTURED};
pub use envelope::{Envelope, MAX_FRAMES, MIN_FRAMES};
pub use error::{FrameError, Result};
pub use header::{decode, encode, Header, HEADER_SIZE, PROTOCOL_VERSION};
pub use message::{Content, Message};
pub use topic::{sanitize, Topic};
