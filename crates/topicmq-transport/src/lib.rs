//! Transport layer for topicmq.
//!
//! A thin layer over ZeroMQ that provides:
//! - An explicit, shareable [`Context`] (no hidden process-wide singleton)
//! - Endpoint addressing for TCP and private `inproc://` channels
//! - Verified socket close via the transport's monitor events
//!
//! This is the lowest layer of topicmq. Sessions build on top of the sockets
//! handed out here.

pub mod context;
pub mod endpoint;
pub mod error;
pub mod monitor;

pub use context::{bind, connect, has_curve, set_option, Context, SocketKind};
pub use endpoint::{
    tcp_bind_address, tcp_connect_address, unique_inproc_address, MONITOR_PREFIX, SHUTDOWN_PREFIX,
};
pub use error::{Result, TransportError};
pub use monitor::{close_verified, CloseOutcome};

/// Re-export of the underlying transport crate.
pub use zmq;
