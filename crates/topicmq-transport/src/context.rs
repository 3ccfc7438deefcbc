use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Socket roles used by topicmq.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Publishing side of a pub/sub pair.
    Pub,
    /// Subscribing side of a pub/sub pair.
    Sub,
    /// Exclusive pair, used for in-process signalling.
    Pair,
}

impl SocketKind {
    fn as_zmq(self) -> zmq::SocketType {
        match self {
            SocketKind::Pub => zmq::PUB,
            SocketKind::Sub => zmq::SUB,
            SocketKind::Pair => zmq::PAIR,
        }
    }

    /// Name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            SocketKind::Pub => "PUB",
            SocketKind::Sub => "SUB",
            SocketKind::Pair => "PAIR",
        }
    }
}

/// Shared transport context.
///
/// Created once by the application and cloned into every session. Clones
/// share the underlying ZeroMQ context, which is torn down when the last
/// clone is dropped. [`Context::terminate`] refuses further socket creation
/// on every clone.
#[derive(Clone)]
pub struct Context {
    inner: zmq::Context,
    terminated: Arc<AtomicBool>,
}

impl Context {
    /// Create a new transport context.
    pub fn new() -> Self {
        info!("transport context initialized");
        Self {
            inner: zmq::Context::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a socket of the given kind with linger disabled.
    pub fn socket(&self, kind: SocketKind) -> Result<zmq::Socket> {
        if self.is_terminated() {
            return Err(TransportError::Terminated);
        }
        let socket = self
            .inner
            .socket(kind.as_zmq())
            .map_err(|source| TransportError::Socket {
                kind: kind.name(),
                source,
            })?;
        set_option("ZMQ_LINGER", socket.set_linger(0))?;
        debug!(kind = kind.name(), "socket created");
        Ok(socket)
    }

    /// Refuse further socket creation.
    ///
    /// Sockets that already exist keep working until their sessions stop.
    pub fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::SeqCst) {
            info!("transport context terminated");
        }
    }

    /// Whether [`Context::terminate`] has been called on any clone.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Number of live handles sharing this context.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.terminated)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("terminated", &self.is_terminated())
            .field("handles", &self.handle_count())
            .finish()
    }
}

/// Bind a socket to an endpoint.
pub fn bind(socket: &zmq::Socket, endpoint: &str) -> Result<()> {
    socket.bind(endpoint).map_err(|source| TransportError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })?;
    debug!(%endpoint, "socket bound");
    Ok(())
}

/// Connect a socket to an endpoint.
pub fn connect(socket: &zmq::Socket, endpoint: &str) -> Result<()> {
    socket
        .connect(endpoint)
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
    debug!(%endpoint, "socket connected");
    Ok(())
}

/// Map the result of a socket option setter.
pub fn set_option(option: &'static str, result: zmq::Result<()>) -> Result<()> {
    result.map_err(|source| TransportError::SetOption { option, source })
}

/// Whether the linked libzmq was built with CURVE security.
pub fn has_curve() -> bool {
    zmq::has("curve").unwrap_or(false)
}
