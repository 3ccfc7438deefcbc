//! Content type tags.
//!
//! The header carries a 3-bit content type. Tags 0 and 1 are implemented;
//! 2 and 3 are reserved for future payload kinds and every other value is
//! unknown. Both reserved and unknown tags survive decoding so the receiver
//! can log what it dropped.

use std::fmt;

/// Structured record payload (schema-encoded bytes).
pub const STRUCTURED: u8 = 0;

/// Opaque byte buffer payload.
pub const RAW: u8 = 1;

/// Reserved: AML payloads.
pub const RESERVED_AML: u8 = 2;

/// Reserved: JSON payloads.
pub const RESERVED_JSON: u8 = 3;

/// Content type carried in the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Serialized structured record.
    Structured,
    /// Opaque bytes.
    Raw,
    /// Any tag without an implementation.
    Reserved(u8),
}

impl ContentType {
    /// Interpret a 3-bit tag.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            STRUCTURED => ContentType::Structured,
            RAW => ContentType::Raw,
            other => ContentType::Reserved(other),
        }
    }

    /// The tag as written on the wire.
    pub fn tag(self) -> u8 {
        match self {
            ContentType::Structured => STRUCTURED,
            ContentType::Raw => RAW,
            ContentType::Reserved(tag) => tag,
        }
    }

    /// Whether messages of this type can be produced and consumed.
    pub fn is_implemented(self) -> bool {
        !matches!(self, ContentType::Reserved(_))
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ContentType::Structured => "structured",
            ContentType::Raw => "raw",
            ContentType::Reserved(RESERVED_AML) => "aml",
            ContentType::Reserved(RESERVED_JSON) => "json",
            ContentType::Reserved(_) => "unknown",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.tag())
    }
}
