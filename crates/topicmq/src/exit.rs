use std::fmt;
use std::io;

use topicmq_session::{ErrorCode, SessionError};
use topicmq_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const UNAVAILABLE: i32 = 69;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err.zmq_error() {
        Some(zmq::Error::EACCES) => CliError::new(PERMISSION_DENIED, format!("{context}: {err}")),
        Some(zmq::Error::EINVAL) => CliError::new(USAGE, format!("{context}: {err}")),
        _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::InvalidKey { .. } | SessionError::InvalidEndpoint { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        SessionError::SecurityUnsupported | SessionError::ServiceDiscoveryUnsupported(_) => {
            CliError::new(UNAVAILABLE, format!("{context}: {err}"))
        }
        SessionError::ReceiverExited => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        other => match other.code() {
            ErrorCode::InvalidTopic => CliError::new(USAGE, format!("{context}: {other}")),
            ErrorCode::InvalidContentType => {
                CliError::new(DATA_INVALID, format!("{context}: {other}"))
            }
            ErrorCode::Error => CliError::new(FAILURE, format!("{context}: {other}")),
        },
    }
}
