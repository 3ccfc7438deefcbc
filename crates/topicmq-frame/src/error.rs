/// Errors that can occur during header, topic and frame handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The content type is reserved or unknown.
    #[error("invalid content type {0}")]
    InvalidContentType(u8),

    /// The protocol version does not fit the header or is not supported.
    #[error("invalid protocol version {0}")]
    InvalidVersion(u8),

    /// The header's reserved bits are not zero.
    #[error("reserved header bits set (header 0x{0:02x})")]
    ReservedBits(u8),

    /// The topic is empty or contains characters outside `[A-Za-z0-9-_./]`.
    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    /// A message arrived with fewer frames than the layout requires.
    #[error("missing frame: expected at least {expected}, got {actual}")]
    MissingFrame { expected: usize, actual: usize },

    /// A message arrived with more frames than the layout allows.
    #[error("too many frames: at most {max}, got {actual}")]
    TooManyFrames { max: usize, actual: usize },

    /// The header frame is not exactly one byte.
    #[error("header frame must be 1 byte, got {0}")]
    HeaderLength(usize),
}

pub type Result<T> = std::result::Result<T, FrameError>;
