use bytes::Bytes;

use crate::content::ContentType;
use crate::error::{FrameError, Result};
use crate::header::{Header, PROTOCOL_VERSION};

/// Message body, tagged by content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// A serialized structured record. The schema is opaque to topicmq.
    Structured(Bytes),
    /// An opaque byte buffer.
    Raw(Bytes),
}

/// A message as published and delivered.
///
/// The content type is derived from the [`Content`] variant, so the tag
/// written on the wire always matches the in-memory value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    version: u8,
    content: Content,
}

impl Message {
    /// Structured record payload at the current protocol version.
    pub fn structured(payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            content: Content::Structured(payload.into()),
        }
    }

    /// Raw bytes payload at the current protocol version.
    pub fn raw(payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            content: Content::Raw(payload.into()),
        }
    }

    /// Build a message from a validated header and its payload frame.
    pub fn from_parts(header: Header, payload: Bytes) -> Result<Self> {
        header.validate()?;
        let content = match header.content_type {
            ContentType::Structured => Content::Structured(payload),
            ContentType::Raw => Content::Raw(payload),
            ContentType::Reserved(tag) => return Err(FrameError::InvalidContentType(tag)),
        };
        Ok(Self {
            version: header.version,
            content,
        })
    }

    /// Protocol version the message was framed with.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Content type tag of the body.
    pub fn content_type(&self) -> ContentType {
        match self.content {
            Content::Structured(_) => ContentType::Structured,
            Content::Raw(_) => ContentType::Raw,
        }
    }

    /// The header describing this message.
    pub fn header(&self) -> Header {
        Header {
            version: self.version,
            content_type: self.content_type(),
            reserved: 0,
        }
    }

    /// Borrow the body.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Payload bytes regardless of content type.
    pub fn payload(&self) -> &Bytes {
        match &self.content {
            Content::Structured(bytes) | Content::Raw(bytes) => bytes,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    /// Consume into the body.
    pub fn into_content(self) -> Content {
        self.content
    }
}
