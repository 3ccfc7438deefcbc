//! Topic-addressed publish/subscribe messaging over ZeroMQ.
//!
//! Publishers bind a TCP port and send messages, each optionally addressed
//! to a slash-separated topic. Subscribers connect, install topic prefix
//! filters, and receive every matching message on a background thread.
//!
//! # Crate Structure
//!
//! - [`transport`]: transport context, addressing, verified close
//! - [`frame`]: header byte, topics and the multi-frame wire layout
//! - [`session`]: publisher and subscriber sessions (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use topicmq_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use topicmq_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use topicmq_session::*;
}
