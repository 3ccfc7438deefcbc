use std::fmt;

use topicmq_frame::FrameError;
use topicmq_transport::TransportError;

/// Coarse outcome classes reported to applications.
///
/// Success is `Ok(())`; every [`SessionError`] collapses to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Transport or session failure.
    Error,
    /// Empty topic, empty topic list, or a topic outside the topic alphabet.
    InvalidTopic,
    /// Unsupported content type.
    InvalidContentType,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Error => "error",
            ErrorCode::InvalidTopic => "invalid topic",
            ErrorCode::InvalidContentType => "invalid content type",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Header, topic or frame error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A topic list operation was given no topics.
    #[error("topic list is empty")]
    EmptyTopicList,

    /// The session has not been started, or has been stopped.
    #[error("session not started")]
    NotStarted,

    /// Key material of the wrong length or encoding.
    #[error("invalid {which} key: expected {expected} ASCII characters, got {actual}")]
    InvalidKey {
        which: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The linked transport was built without CURVE security.
    #[error("CURVE security is not supported by the linked transport")]
    SecurityUnsupported,

    /// The remote endpoint is unusable.
    #[error("invalid endpoint {ip:?}:{port}")]
    InvalidEndpoint { ip: String, port: u16 },

    /// The receive loop is no longer running.
    #[error("receive loop exited")]
    ReceiverExited,

    /// A blocking session operation was called from the session's own receive thread.
    #[error("{0} cannot be called from the receive thread")]
    CalledFromReceiver(&'static str),

    /// The receive thread could not be spawned.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(std::io::Error),

    /// Name-based service discovery is not implemented.
    #[error("service discovery is not supported (service {0:?})")]
    ServiceDiscoveryUnsupported(String),
}

impl SessionError {
    /// Application-facing outcome class.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Frame(FrameError::InvalidTopic(_)) | SessionError::EmptyTopicList => {
                ErrorCode::InvalidTopic
            }
            SessionError::Frame(FrameError::InvalidContentType(_)) => {
                ErrorCode::InvalidContentType
            }
            _ => ErrorCode::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_collapse_errors() {
        assert_eq!(
            SessionError::from(FrameError::InvalidTopic("a b".into())).code(),
            ErrorCode::InvalidTopic
        );
        assert_eq!(SessionError::EmptyTopicList.code(), ErrorCode::InvalidTopic);
        assert_eq!(
            SessionError::from(FrameError::InvalidContentType(2)).code(),
            ErrorCode::InvalidContentType
        );
        assert_eq!(SessionError::NotStarted.code(), ErrorCode::Error);
        assert_eq!(
            SessionError::from(TransportError::Terminated).code(),
            ErrorCode::Error
        );
        assert_eq!(SessionError::SecurityUnsupported.code(), ErrorCode::Error);
    }
}
