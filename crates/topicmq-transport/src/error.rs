/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: zmq::Error,
    },

    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: zmq::Error,
    },

    /// Failed to create a socket from the context.
    #[error("failed to create {kind} socket: {source}")]
    Socket {
        kind: &'static str,
        source: zmq::Error,
    },

    /// Failed to apply a socket option.
    #[error("failed to set socket option {option}: {source}")]
    SetOption {
        option: &'static str,
        source: zmq::Error,
    },

    /// Failed to send a message.
    #[error("send failed: {0}")]
    Send(zmq::Error),

    /// Failed to receive a message.
    #[error("receive failed: {0}")]
    Recv(zmq::Error),

    /// Failed while waiting on a poll set.
    #[error("poll failed: {0}")]
    Poll(zmq::Error),

    /// Failed to attach a socket monitor.
    #[error("failed to monitor {endpoint}: {source}")]
    Monitor {
        endpoint: String,
        source: zmq::Error,
    },

    /// The context has been terminated.
    #[error("transport context terminated")]
    Terminated,
}

impl TransportError {
    /// The underlying ZeroMQ error, if any.
    pub fn zmq_error(&self) -> Option<zmq::Error> {
        match self {
            TransportError::Bind { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Socket { source, .. }
            | TransportError::SetOption { source, .. }
            | TransportError::Monitor { source, .. } => Some(*source),
            TransportError::Send(err) | TransportError::Recv(err) | TransportError::Poll(err) => {
                Some(*err)
            }
            TransportError::Terminated => None,
        }
    }

    /// Whether the failure was a non-blocking operation that would have blocked.
    pub fn is_would_block(&self) -> bool {
        self.zmq_error() == Some(zmq::Error::EAGAIN)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
