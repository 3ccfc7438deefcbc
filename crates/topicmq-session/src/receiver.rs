//! The subscriber's receive loop.
//!
//! Runs on its own thread and owns the SUB socket and the client end of the
//! control pair for as long as it runs. The sockets are handed back when the
//! loop ends so the session closes them in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Receiver;
use tracing::{debug, error, trace, warn};

use topicmq_frame::{Envelope, MAX_FRAMES};
use topicmq_transport::{connect, set_option, TransportError};

use crate::control::{Command, Reply, Request, Signal};
use crate::sink::Sink;

/// Sockets owned by the receive thread.
pub(crate) struct ReceiverSockets {
    /// Client end of the control pair.
    pub signal: zmq::Socket,
    pub subscriber: zmq::Socket,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Shutdown,
    TransportError,
}

/// Marks the loop dead on every exit path, unwinding included.
struct ClearOnExit(Arc<AtomicBool>);

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Step {
    Continue,
    Exit(Exit),
}

pub(crate) struct ReceiveLoop {
    sockets: ReceiverSockets,
    requests: Receiver<Request>,
    sink: Arc<Sink>,
    /// Cleared by the loop when it exits, or by the session to ask it to.
    running: Arc<AtomicBool>,
}

impl ReceiveLoop {
    pub(crate) fn new(
        sockets: ReceiverSockets,
        requests: Receiver<Request>,
        sink: Arc<Sink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sockets,
            requests,
            sink,
            running,
        }
    }

    /// Run until shutdown or a transport error.
    pub(crate) fn run(self) -> ReceiverSockets {
        let _alive = ClearOnExit(Arc::clone(&self.running));
        debug!("receive loop started");
        let exit = loop {
            match self.step() {
                Ok(Step::Continue) if !self.running.load(Ordering::SeqCst) => break Exit::Shutdown,
                Ok(Step::Continue) => {}
                Ok(Step::Exit(exit)) => break exit,
                Err(e) => {
                    error!(error = %e, "receive loop terminated by transport error");
                    break Exit::TransportError;
                }
            }
        };
        debug!(?exit, "receive loop stopped");
        self.sockets
    }

    fn step(&self) -> Result<Step, TransportError> {
        let (control_ready, data_ready) = {
            let mut items = [
                self.sockets.signal.as_poll_item(zmq::POLLIN),
                self.sockets.subscriber.as_poll_item(zmq::POLLIN),
            ];
            match zmq::poll(&mut items, -1) {
                Ok(_) => {}
                Err(zmq::Error::EINTR) => return Ok(Step::Continue),
                Err(e) => return Err(TransportError::Poll(e)),
            }
            (items[0].is_readable(), items[1].is_readable())
        };

        if control_ready {
            return self.handle_control();
        }
        if data_ready {
            self.handle_data()?;
        }
        Ok(Step::Continue)
    }

    fn handle_control(&self) -> Result<Step, TransportError> {
        let frame = match self.sockets.signal.recv_bytes(zmq::DONTWAIT) {
            Ok(frame) => frame,
            Err(zmq::Error::EAGAIN) => return Ok(Step::Continue),
            Err(e) => return Err(TransportError::Recv(e)),
        };
        match Signal::parse(&frame) {
            Signal::Shutdown => Ok(Step::Exit(Exit::Shutdown)),
            Signal::Command => {
                while let Ok(request) = self.requests.try_recv() {
                    let name = request.command.name();
                    let reply = self.execute(request.command);
                    if let Err(e) = &reply {
                        warn!(command = name, error = %e, "control command failed");
                    }
                    if request.reply.send(reply).is_err() {
                        debug!(command = name, "caller gave up waiting for reply");
                    }
                }
                Ok(Step::Continue)
            }
            Signal::Unknown => {
                warn!(len = frame.len(), "ignoring unknown control signal");
                Ok(Step::Continue)
            }
        }
    }

    fn execute(&self, command: Command) -> Reply {
        let socket = &self.sockets.subscriber;
        match command {
            Command::Subscribe(filter) => {
                set_option("ZMQ_SUBSCRIBE", socket.set_subscribe(&filter))?;
                debug!(filter = %String::from_utf8_lossy(&filter), "filter added");
            }
            Command::Unsubscribe(filter) => {
                set_option("ZMQ_UNSUBSCRIBE", socket.set_unsubscribe(&filter))?;
                debug!(filter = %String::from_utf8_lossy(&filter), "filter removed");
            }
            Command::Connect { endpoint, keys } => {
                keys.apply(socket)?;
                connect(socket, &endpoint)?;
            }
        }
        Ok(())
    }

    fn handle_data(&self) -> Result<(), TransportError> {
        let Some(frames) = self.read_frames()? else {
            return Ok(());
        };
        let count = frames.len();
        match Envelope::decode(frames) {
            Ok(envelope) => {
                trace!(
                    topic = envelope.topic.as_ref().map(|t| t.as_str()),
                    len = envelope.message.len(),
                    "dispatching message"
                );
                self.sink.dispatch(envelope);
            }
            Err(e) => warn!(frames = count, error = %e, "dropping invalid message"),
        }
        Ok(())
    }

    /// Read every frame of one logical message.
    ///
    /// `None` when nothing was waiting after all.
    fn read_frames(&self) -> Result<Option<Vec<Bytes>>, TransportError> {
        let socket = &self.sockets.subscriber;
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        loop {
            let frame = match socket.recv_bytes(zmq::DONTWAIT) {
                Ok(frame) => frame,
                Err(zmq::Error::EAGAIN) if frames.is_empty() => return Ok(None),
                Err(e) => return Err(TransportError::Recv(e)),
            };
            frames.push(Bytes::from(frame));
            if !socket.get_rcvmore().map_err(TransportError::Recv)? {
                return Ok(Some(frames));
            }
        }
    }
}
