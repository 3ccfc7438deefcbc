//! Verified socket close.
//!
//! Closing a ZeroMQ socket is asynchronous: the call returns before the
//! I/O thread has released the listening descriptor. A publisher that is
//! stopped and immediately restarted on the same port would race that
//! release, so the close waits for the monitor's CLOSED event.

use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::context::{connect, set_option, Context, SocketKind};
use crate::endpoint::{unique_inproc_address, MONITOR_PREFIX};
use crate::error::{Result, TransportError};

/// Size of the first frame of a monitor event: event id (u16) + value (u32).
const EVENT_FRAME_LEN: usize = 6;

/// Outcome of a verified close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The transport confirmed the socket closed.
    Confirmed,
    /// No confirmation arrived within the wait bound.
    Unconfirmed,
}

/// Close `socket` and wait up to `timeout` for the transport to confirm it.
///
/// Errors are returned only when the monitor cannot be set up; in that case
/// the socket is still closed before returning.
pub fn close_verified(ctx: &Context, socket: zmq::Socket, timeout: Duration) -> Result<CloseOutcome> {
    let address = unique_inproc_address(MONITOR_PREFIX);
    socket
        .monitor(&address, zmq::SocketEvent::CLOSED as i32)
        .map_err(|source| TransportError::Monitor {
            endpoint: address.clone(),
            source,
        })?;

    let watcher = ctx.socket(SocketKind::Pair)?;
    connect(&watcher, &address)?;

    drop(socket);

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            error!(?timeout, "no close confirmation from transport");
            return Ok(CloseOutcome::Unconfirmed);
        }
        set_option(
            "ZMQ_RCVTIMEO",
            watcher.set_rcvtimeo(remaining.as_millis().min(i32::MAX as u128) as i32),
        )?;

        match watcher.recv_multipart(0) {
            Ok(frames) => {
                if is_closed_event(&frames) {
                    debug!("close confirmed by transport");
                    return Ok(CloseOutcome::Confirmed);
                }
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(err) => {
                error!(%err, "monitor receive failed while closing");
                return Ok(CloseOutcome::Unconfirmed);
            }
        }
    }
}

fn is_closed_event(frames: &[Vec<u8>]) -> bool {
    let Some(first) = frames.first() else {
        return false;
    };
    if first.len() < EVENT_FRAME_LEN {
        return false;
    }
    let event = u16::from_le_bytes([first[0], first[1]]);
    event == zmq::SocketEvent::CLOSED as u16
}
