//! Messages between a subscriber session and its receive thread.
//!
//! The control PAIR carries one-frame sentinels. A `command` sentinel tells
//! the receive loop that requests are waiting on the command queue; the loop
//! drains the queue and answers each request on its reply channel.

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::keys::ClientKeys;

/// Stop the receive loop.
pub(crate) const SHUTDOWN: &[u8] = b"shutdown";

/// Requests are waiting on the command queue.
pub(crate) const COMMAND: &[u8] = b"command";

/// Sentinel received on the control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Shutdown,
    Command,
    Unknown,
}

impl Signal {
    pub(crate) fn parse(frame: &[u8]) -> Self {
        match frame {
            SHUTDOWN => Signal::Shutdown,
            COMMAND => Signal::Command,
            _ => Signal::Unknown,
        }
    }
}

/// An operation the receive loop performs on the SUB socket.
#[derive(Debug)]
pub(crate) enum Command {
    /// Add a prefix filter. Empty matches everything.
    Subscribe(Vec<u8>),
    /// Remove a prefix filter.
    Unsubscribe(Vec<u8>),
    /// Apply keys, then connect to another publisher.
    Connect { endpoint: String, keys: ClientKeys },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Subscribe(_) => "subscribe",
            Command::Unsubscribe(_) => "unsubscribe",
            Command::Connect { .. } => "connect",
        }
    }
}

/// Outcome of a command, as seen by the caller.
pub(crate) type Reply = Result<()>;

/// A command with the channel its outcome goes back on.
#[derive(Debug)]
pub(crate) struct Request {
    pub command: Command,
    pub reply: Sender<Reply>,
}
