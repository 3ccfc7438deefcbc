use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use topicmq_frame::Topic;
use topicmq_transport::{
    bind, connect, has_curve, set_option, tcp_connect_address, unique_inproc_address, Context,
    SocketKind, TransportError, SHUTDOWN_PREFIX,
};

use crate::control::{Command, Reply, Request, COMMAND, SHUTDOWN};
use crate::error::{Result, SessionError};
use crate::keys::KeyStore;
use crate::receiver::{ReceiveLoop, ReceiverSockets};
use crate::sink::Sink;

/// Subscriber tuning.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Linger period for the SUB socket at close, in milliseconds.
    pub linger: i32,
    /// Inbound queue limit, in messages.
    pub receive_high_water_mark: i32,
    /// How often a caller waiting on the receive loop checks that it is
    /// still alive.
    pub command_poll_interval: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            linger: 0,
            receive_high_water_mark: 1000,
            command_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Where the subscriber connects on `start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Endpoint { ip: String, port: u16 },
    Service(String),
}

/// Handle on a running receive thread.
struct ReceiveThread {
    handle: JoinHandle<ReceiverSockets>,
    thread: ThreadId,
    running: Arc<AtomicBool>,
}

impl ReceiveThread {
    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }
}

/// Runtime resources, present between `start()` and `stop()`.
struct Running {
    /// Server end of the control pair.
    control: zmq::Socket,
    requests: Sender<Request>,
    receiver: ReceiveThread,
}

#[derive(Default)]
struct SubscriberState {
    running: Option<Running>,
    keys: KeyStore,
}

/// Subscribing side of a topic-addressed pub/sub link.
///
/// [`start`](Self::start) connects to the publisher and spawns one receive
/// thread, which delivers every accepted message to the session's [`Sink`].
/// Filters start empty: nothing is delivered until one of the `subscribe`
/// methods has been called.
///
/// # Example
///
/// ```no_run
/// use topicmq_session::{Sink, SubscriberSession};
/// use topicmq_transport::Context;
///
/// let (sink, deliveries) = Sink::channel();
/// let subscriber = SubscriberSession::new(Context::new(), "127.0.0.1", 5562, sink);
/// subscriber.start()?;
/// subscriber.subscribe("home/")?;
/// let envelope = deliveries.recv().expect("publisher went away");
/// println!("{:?} {:?}", envelope.topic, envelope.message.payload());
/// subscriber.stop()?;
/// # Ok::<(), topicmq_session::SessionError>(())
/// ```
pub struct SubscriberSession {
    ctx: Context,
    target: Target,
    sink: Arc<Sink>,
    config: SubscriberConfig,
    state: Mutex<SubscriberState>,
}

impl SubscriberSession {
    /// Subscriber for the publisher at `ip:port`.
    pub fn new(ctx: Context, ip: impl Into<String>, port: u16, sink: Sink) -> Self {
        Self::with_config(ctx, ip, port, sink, SubscriberConfig::default())
    }

    /// Subscriber for the publisher at `ip:port`.
    pub fn with_config(
        ctx: Context,
        ip: impl Into<String>,
        port: u16,
        sink: Sink,
        config: SubscriberConfig,
    ) -> Self {
        let target = Target::Endpoint {
            ip: ip.into(),
            port,
        };
        Self::build(ctx, target, sink, config)
    }

    /// Subscriber that locates its publisher by service name.
    ///
    /// Discovery is not implemented: `start()` on such a session fails with
    /// [`SessionError::ServiceDiscoveryUnsupported`].
    pub fn with_service_name(ctx: Context, name: impl Into<String>, sink: Sink) -> Self {
        Self::build(
            ctx,
            Target::Service(name.into()),
            sink,
            SubscriberConfig::default(),
        )
    }

    fn build(ctx: Context, target: Target, sink: Sink, config: SubscriberConfig) -> Self {
        Self {
            ctx,
            target,
            sink: Arc::new(sink),
            config,
            state: Mutex::new(SubscriberState::default()),
        }
    }

    /// Publisher address; empty for a service-name session.
    pub fn ip(&self) -> &str {
        match &self.target {
            Target::Endpoint { ip, .. } => ip,
            Target::Service(_) => "",
        }
    }

    /// Publisher port; 0 for a service-name session.
    pub fn port(&self) -> u16 {
        match &self.target {
            Target::Endpoint { port, .. } => *port,
            Target::Service(_) => 0,
        }
    }

    /// Service name; empty for an address session.
    pub fn service_name(&self) -> &str {
        match &self.target {
            Target::Endpoint { .. } => "",
            Target::Service(name) => name,
        }
    }

    /// Whether the receive loop is running.
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .running
            .as_ref()
            .is_some_and(|running| running.receiver.is_alive())
    }

    /// Stage the publisher's CURVE public key.
    pub fn set_server_public_key(&self, key: &str) -> Result<()> {
        if !has_curve() {
            return Err(SessionError::SecurityUnsupported);
        }
        self.state.lock().keys.stage_server_public(key)
    }

    /// Stage this subscriber's CURVE keypair.
    ///
    /// A rejected call leaves previously staged keys as they were.
    pub fn set_client_keys(&self, secret: &str, public: &str) -> Result<()> {
        if !has_curve() {
            return Err(SessionError::SecurityUnsupported);
        }
        self.state.lock().keys.stage_client(secret, public)
    }

    /// Connect and spawn the receive thread. No-op while running.
    ///
    /// A receive thread that died since the last call is reaped first.
    /// Staged keys are wiped once the thread is running; a failed start
    /// leaves them staged for the next attempt.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.start_locked(&mut state)
    }

    /// Stop the receive thread and close every socket. No-op when stopped.
    pub fn stop(&self) -> Result<()> {
        let running = {
            let mut state = self.state.lock();
            if state
                .running
                .as_ref()
                .is_some_and(|running| running.receiver.is_current())
            {
                return Err(SessionError::CalledFromReceiver("stop"));
            }
            state.keys.clear();
            state.running.take()
        };
        match running {
            Some(running) => Self::shutdown(running),
            None => debug!("subscriber not started; nothing to stop"),
        }
        Ok(())
    }

    /// Receive every message, including topic-less ones.
    pub fn subscribe_all(&self) -> Result<()> {
        self.request(Command::Subscribe(Vec::new()))
    }

    /// Receive messages whose topic starts with `topic`.
    pub fn subscribe(&self, topic: &str) -> Result<()> {
        let topic = Topic::new(topic)?;
        self.request(Command::Subscribe(topic.into_string().into_bytes()))
    }

    /// Subscribe to each topic in order, stopping at the first failure.
    ///
    /// Filters installed before a failure stay installed.
    pub fn subscribe_topics<S: AsRef<str>>(&self, topics: &[S]) -> Result<()> {
        if topics.is_empty() {
            return Err(SessionError::EmptyTopicList);
        }
        for topic in topics {
            self.subscribe(topic.as_ref())?;
        }
        Ok(())
    }

    /// Remove the empty filter installed by [`subscribe_all`](Self::subscribe_all).
    pub fn unsubscribe_all(&self) -> Result<()> {
        self.request(Command::Unsubscribe(Vec::new()))
    }

    /// Remove the filter for `topic`.
    pub fn unsubscribe(&self, topic: &str) -> Result<()> {
        let topic = Topic::new(topic)?;
        self.request(Command::Unsubscribe(topic.into_string().into_bytes()))
    }

    /// Unsubscribe each topic in order, stopping at the first failure.
    pub fn unsubscribe_topics<S: AsRef<str>>(&self, topics: &[S]) -> Result<()> {
        if topics.is_empty() {
            return Err(SessionError::EmptyTopicList);
        }
        for topic in topics {
            self.unsubscribe(topic.as_ref())?;
        }
        Ok(())
    }

    /// Also connect to the publisher at `ip:port` and subscribe to `topic`.
    ///
    /// Keys staged since `start()` are applied before connecting and wiped
    /// once the connection is made.
    pub fn subscribe_endpoint(&self, ip: &str, port: u16, topic: &str) -> Result<()> {
        if ip.is_empty() || port == 0 {
            return Err(SessionError::InvalidEndpoint {
                ip: ip.to_string(),
                port,
            });
        }
        let topic = Topic::new(topic)?;
        let endpoint = tcp_connect_address(ip, port);

        let pending = {
            let mut state = self.state.lock();
            if state.running.is_none() {
                return Err(SessionError::NotStarted);
            }
            let keys = state.keys.client_copy();
            Self::submit_locked(&state, Command::Connect { endpoint, keys })?
        };
        pending.wait(self.config.command_poll_interval)?;
        self.state.lock().keys.wipe_client();
        self.request(Command::Subscribe(topic.into_string().into_bytes()))
    }

    /// Hand a command to the receive loop and wait for its reply.
    ///
    /// The session lock is released while waiting, so deliveries running on
    /// the receive thread can still reach the session.
    fn request(&self, command: Command) -> Result<()> {
        let pending = {
            let state = self.state.lock();
            Self::submit_locked(&state, command)?
        };
        pending.wait(self.config.command_poll_interval)
    }

    fn submit_locked(state: &SubscriberState, command: Command) -> Result<Pending> {
        let running = state.running.as_ref().ok_or(SessionError::NotStarted)?;
        let receiver = &running.receiver;
        if receiver.is_current() {
            return Err(SessionError::CalledFromReceiver(command.name()));
        }
        if !receiver.is_alive() {
            return Err(SessionError::ReceiverExited);
        }

        let name = command.name();
        let (reply, replies) = crossbeam_channel::bounded(1);
        running
            .requests
            .send(Request { command, reply })
            .map_err(|_| SessionError::ReceiverExited)?;
        if let Err(e) = running.control.send(COMMAND, zmq::DONTWAIT) {
            return Err(match e {
                zmq::Error::EAGAIN => SessionError::ReceiverExited,
                other => TransportError::Send(other).into(),
            });
        }
        Ok(Pending {
            name,
            replies,
            alive: Arc::clone(&receiver.running),
        })
    }

    fn start_locked(&self, state: &mut SubscriberState) -> Result<()> {
        if let Some(running) = state.running.take() {
            if running.receiver.is_current() {
                state.running = Some(running);
                return Err(SessionError::CalledFromReceiver("start"));
            }
            if running.receiver.is_alive() {
                state.running = Some(running);
                debug!("subscriber already started");
                return Ok(());
            }
            warn!("receive loop exited; restarting");
            Self::shutdown(running);
        }

        let endpoint = match &self.target {
            Target::Endpoint { ip, port } => tcp_connect_address(ip, *port),
            Target::Service(name) => {
                return Err(SessionError::ServiceDiscoveryUnsupported(name.clone()))
            }
        };

        let address = unique_inproc_address(SHUTDOWN_PREFIX);
        let control = self.ctx.socket(SocketKind::Pair)?;
        bind(&control, &address)?;
        let signal = self.ctx.socket(SocketKind::Pair)?;
        connect(&signal, &address)?;

        let subscriber = self.ctx.socket(SocketKind::Sub)?;
        set_option("ZMQ_LINGER", subscriber.set_linger(self.config.linger))?;
        set_option(
            "ZMQ_RCVHWM",
            subscriber.set_rcvhwm(self.config.receive_high_water_mark),
        )?;
        state.keys.apply_client(&subscriber)?;
        connect(&subscriber, &endpoint)?;

        let (requests, commands) = crossbeam_channel::unbounded();
        let alive = Arc::new(AtomicBool::new(true));
        let receive_loop = ReceiveLoop::new(
            ReceiverSockets { signal, subscriber },
            commands,
            Arc::clone(&self.sink),
            Arc::clone(&alive),
        );
        let handle = thread::Builder::new()
            .name("topicmq-receiver".into())
            .spawn(move || receive_loop.run())
            .map_err(SessionError::Spawn)?;
        state.keys.wipe_client();

        state.running = Some(Running {
            control,
            requests,
            receiver: ReceiveThread {
                thread: handle.thread().id(),
                handle,
                running: alive,
            },
        });
        info!(%endpoint, "subscriber started");
        Ok(())
    }

    /// Signal the receive loop, join it and close the sockets in order:
    /// the signal pair (client, then server), then the subscriber.
    fn shutdown(running: Running) {
        let Running {
            control,
            requests,
            receiver,
        } = running;
        drop(requests);

        if let Err(e) = control.send(SHUTDOWN, zmq::DONTWAIT) {
            debug!(error = %e, "shutdown signal not delivered; receive loop already gone");
        }

        if receiver.is_current() {
            // Dropped from inside a delivery: the loop checks the flag once
            // the callback returns and releases its own sockets.
            receiver.running.store(false, Ordering::SeqCst);
            warn!("subscriber dropped on its receive thread; detaching");
            return;
        }

        match receiver.handle.join() {
            Ok(ReceiverSockets { signal, subscriber }) => {
                drop(signal);
                drop(control);
                drop(subscriber);
            }
            Err(_) => {
                error!("receive thread panicked");
                drop(control);
            }
        }
        info!("subscriber stopped");
    }
}

/// A submitted command awaiting its reply.
struct Pending {
    name: &'static str,
    replies: crossbeam_channel::Receiver<Reply>,
    alive: Arc<AtomicBool>,
}

impl Pending {
    fn wait(self, poll_interval: Duration) -> Result<()> {
        loop {
            match self.replies.recv_timeout(poll_interval) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) if self.alive.load(Ordering::SeqCst) => continue,
                Err(_) => {
                    warn!(command = self.name, "receive loop exited before replying");
                    return Err(SessionError::ReceiverExited);
                }
            }
        }
    }
}

impl Drop for SubscriberSession {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.keys.clear();
        if let Some(running) = state.running.take() {
            Self::shutdown(running);
        }
    }
}

impl std::fmt::Debug for SubscriberSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSession")
            .field("target", &self.target)
            .field("sink", &self.sink)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
