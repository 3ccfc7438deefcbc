use crate::content::ContentType;
use crate::error::{FrameError, Result};

/// Protocol version written by this implementation.
pub const PROTOCOL_VERSION: u8 = 1;

/// Header frame size in bytes.
pub const HEADER_SIZE: usize = 1;

const CONTENT_TYPE_SHIFT: u8 = 5;
const VERSION_SHIFT: u8 = 2;
const FIELD_MASK: u8 = 0b111;
const RESERVED_MASK: u8 = 0b11;

/// Decoded header byte.
///
/// ```text
///   7   6   5   4   3   2   1   0
/// ┌───────────┬───────────┬───────┐
/// │ content   │ version   │ rsvd  │
/// │ type (3b) │ (3b)      │ (2b)  │
/// └───────────┴───────────┴───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version, bits [4:2].
    pub version: u8,
    /// Content type, bits [7:5].
    pub content_type: ContentType,
    /// Reserved bits [1:0]; zero in every valid header.
    pub reserved: u8,
}

impl Header {
    /// Header for the current protocol version.
    pub fn current(content_type: ContentType) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            content_type,
            reserved: 0,
        }
    }

    /// Encode into the wire byte.
    pub fn encode(&self) -> Result<u8> {
        if self.reserved != 0 {
            return Err(FrameError::ReservedBits(self.reserved));
        }
        encode(self.version, self.content_type)
    }

    /// Receive-side acceptance check.
    pub fn validate(&self) -> Result<()> {
        if !self.content_type.is_implemented() {
            return Err(FrameError::InvalidContentType(self.content_type.tag()));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(FrameError::InvalidVersion(self.version));
        }
        if self.reserved != 0 {
            return Err(FrameError::ReservedBits(self.reserved));
        }
        Ok(())
    }
}

/// Pack a version and content type into a header byte.
///
/// Only implemented content types are accepted.
pub fn encode(version: u8, content_type: ContentType) -> Result<u8> {
    if !content_type.is_implemented() {
        return Err(FrameError::InvalidContentType(content_type.tag()));
    }
    if version > FIELD_MASK {
        return Err(FrameError::InvalidVersion(version));
    }
    Ok((content_type.tag() << CONTENT_TYPE_SHIFT) | (version << VERSION_SHIFT))
}

/// Unpack a header byte. Never fails.
pub fn decode(byte: u8) -> Header {
    Header {
        version: (byte >> VERSION_SHIFT) & FIELD_MASK,
        content_type: ContentType::from_tag((byte >> CONTENT_TYPE_SHIFT) & FIELD_MASK),
        reserved: byte & RESERVED_MASK,
    }
}
