//! Publisher and subscriber sessions for topicmq.
//!
//! A [`PublisherSession`] binds a TCP port and sends framed messages,
//! optionally addressed to a topic. A [`SubscriberSession`] connects to one or
//! more publishers, installs prefix filters, and delivers every accepted
//! message to its [`Sink`] from a dedicated receive thread.
//!
//! Both sessions can be started, stopped and started again. Dropping a
//! session stops it.

mod control;
pub mod error;
pub mod keys;
pub mod publisher;
mod receiver;
pub mod sink;
pub mod subscriber;

pub use error::{ErrorCode, Result, SessionError};
pub use keys::{KeyStore, KEY_LEN};
pub use publisher::{PublisherConfig, PublisherSession};
pub use sink::{MessageCallback, MessageHandler, Sink, TopicMessageCallback};
pub use subscriber::{SubscriberConfig, SubscriberSession};
