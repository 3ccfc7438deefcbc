use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::header::{decode, HEADER_SIZE};
use crate::message::Message;
use crate::topic::Topic;

/// Frames in a topic-less message: header, payload.
pub const MIN_FRAMES: usize = 2;

/// Frames in a topic-addressed message: topic, header, payload.
pub const MAX_FRAMES: usize = 3;

/// A message with its optional routing topic.
///
/// Wire layout, one transport frame per box:
/// ```text
/// ┌─────────────────────┐ ┌──────────┐ ┌───────────────┐
/// │ topic (UTF-8,       │ │ header   │ │ payload       │
/// │ optional)           │ │ (1 byte) │ │ (raw bytes)   │
/// └─────────────────────┘ └──────────┘ └───────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Routing topic; `None` for broadcast messages.
    pub topic: Option<Topic>,
    /// The message.
    pub message: Message,
}

impl Envelope {
    /// Envelope without a topic.
    pub fn broadcast(message: Message) -> Self {
        Self {
            topic: None,
            message,
        }
    }

    /// Envelope addressed to a topic.
    pub fn addressed(topic: Topic, message: Message) -> Self {
        Self {
            topic: Some(topic),
            message,
        }
    }

    /// Encode into transport frames.
    pub fn encode(&self) -> Result<Vec<Bytes>> {
        let header = self.message.header().encode()?;
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        if let Some(topic) = &self.topic {
            frames.push(Bytes::copy_from_slice(topic.as_bytes()));
        }
        frames.push(Bytes::copy_from_slice(&[header]));
        frames.push(self.message.payload().clone());
        Ok(frames)
    }

    /// Decode transport frames received as one logical message.
    pub fn decode(mut frames: Vec<Bytes>) -> Result<Self> {
        if frames.len() < MIN_FRAMES {
            return Err(FrameError::MissingFrame {
                expected: MIN_FRAMES,
                actual: frames.len(),
            });
        }
        if frames.len() > MAX_FRAMES {
            return Err(FrameError::TooManyFrames {
                max: MAX_FRAMES,
                actual: frames.len(),
            });
        }

        let payload = frames.pop().unwrap_or_default();
        let header_frame = frames.pop().unwrap_or_default();
        let topic = match frames.pop() {
            Some(frame) => Some(Topic::from_wire(&frame)?),
            None => None,
        };

        if header_frame.len() != HEADER_SIZE {
            return Err(FrameError::HeaderLength(header_frame.len()));
        }
        let message = Message::from_parts(decode(header_frame[0]), payload)?;

        Ok(Self { topic, message })
    }
}
