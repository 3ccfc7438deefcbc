//! Topic validation and canonicalization.
//!
//! Topics are path-like strings over `[A-Za-z0-9-_./]`. The canonical form
//! ends with a `/` so that prefix filtering only matches whole segments:
//! a subscription to `home/` sees `home/kitchen/` but not `homeowners/`.
//!
//! Topics read off the wire are kept exactly as received. Publishers built
//! on this crate only ever send canonical topics, but a foreign publisher's
//! topic frame is delivered unchanged rather than rewritten or dropped.

use std::fmt;

use crate::error::{FrameError, Result};

const SEPARATOR: char = '/';

fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

/// Validate and canonicalize a topic.
///
/// Returns `None` for the empty string or any character outside the topic
/// alphabet; otherwise the topic ending in exactly one `/`.
pub fn sanitize(topic: &str) -> Option<String> {
    if topic.is_empty() || !topic.chars().all(is_topic_char) {
        return None;
    }
    let mut canonical = topic.trim_end_matches(SEPARATOR).to_string();
    canonical.push(SEPARATOR);
    Some(canonical)
}

/// A topic. Canonical when built with [`Topic::new`]; verbatim when read
/// with [`Topic::from_wire`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Validate and canonicalize.
    pub fn new(topic: &str) -> Result<Self> {
        sanitize(topic)
            .map(Topic)
            .ok_or_else(|| FrameError::InvalidTopic(topic.to_string()))
    }

    /// Topic frame received from the wire, kept verbatim.
    ///
    /// Only UTF-8 is required.
    pub fn from_wire(frame: &[u8]) -> Result<Self> {
        std::str::from_utf8(frame)
            .map(|text| Topic(text.to_string()))
            .map_err(|_| FrameError::InvalidTopic(String::from_utf8_lossy(frame).into_owned()))
    }

    /// The topic text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes as written in the topic frame and used as a prefix filter.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether a subscription to `self` receives messages published on `other`.
    pub fn is_prefix_of(&self, other: &Topic) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Consume into the topic text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Topic {
    type Error = FrameError;

    fn try_from(value: &str) -> Result<Self> {
        Topic::new(value)
    }
}
