use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use topicmq_frame::{Envelope, Message, Topic};
use topicmq_transport::{
    bind, close_verified, has_curve, set_option, tcp_bind_address, CloseOutcome, Context,
    SocketKind, TransportError,
};

use crate::error::{Result, SessionError};
use crate::keys::KeyStore;

/// Publisher tuning.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// How long `stop()` waits for the transport to confirm the close.
    pub close_timeout: Duration,
    /// Linger period for unsent messages at close, in milliseconds.
    pub linger: i32,
    /// Outbound queue limit, in messages.
    pub send_high_water_mark: i32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(1),
            linger: 0,
            send_high_water_mark: 1000,
        }
    }
}

#[derive(Default)]
struct PublisherState {
    socket: Option<zmq::Socket>,
    keys: KeyStore,
}

/// Publishing side of a topic-addressed pub/sub link.
///
/// Binds `tcp://*:<port>` on [`start`](Self::start). Every publish is sent
/// under the session lock, so the frames of one message are never
/// interleaved with another's.
///
/// # Example
///
/// ```no_run
/// use topicmq_session::PublisherSession;
/// use topicmq_frame::Message;
/// use topicmq_transport::Context;
///
/// let publisher = PublisherSession::new(Context::new(), 5562);
/// publisher.start()?;
/// publisher.publish_topic("home/livingroom", &Message::raw(&b"on"[..]))?;
/// publisher.stop()?;
/// # Ok::<(), topicmq_session::SessionError>(())
/// ```
pub struct PublisherSession {
    ctx: Context,
    port: u16,
    config: PublisherConfig,
    state: Mutex<PublisherState>,
}

impl PublisherSession {
    /// Publisher for `port` with default settings.
    pub fn new(ctx: Context, port: u16) -> Self {
        Self::with_config(ctx, port, PublisherConfig::default())
    }

    /// Publisher for `port`.
    pub fn with_config(ctx: Context, port: u16, config: PublisherConfig) -> Self {
        Self {
            ctx,
            port,
            config,
            state: Mutex::new(PublisherState::default()),
        }
    }

    /// Port the publisher binds.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the publisher is bound.
    pub fn is_started(&self) -> bool {
        self.state.lock().socket.is_some()
    }

    /// Stage the CURVE server secret key applied at the next `start()`.
    pub fn set_server_secret_key(&self, key: &str) -> Result<()> {
        if !has_curve() {
            return Err(SessionError::SecurityUnsupported);
        }
        self.state.lock().keys.stage_server_secret(key)
    }

    /// Create and bind the socket. No-op when already started.
    ///
    /// The staged server key is wiped once the socket is bound. A failed
    /// start leaves it staged, so a retry is secured the same way.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.socket.is_some() {
            debug!(port = self.port, "publisher already started");
            return Ok(());
        }

        let endpoint = tcp_bind_address(self.port);
        let socket = self.ctx.socket(SocketKind::Pub)?;
        set_option("ZMQ_LINGER", socket.set_linger(self.config.linger))?;
        set_option(
            "ZMQ_SNDHWM",
            socket.set_sndhwm(self.config.send_high_water_mark),
        )?;
        state.keys.apply_server(&socket)?;
        bind(&socket, &endpoint)?;
        state.keys.wipe_server();

        state.socket = Some(socket);
        info!(port = self.port, %endpoint, "publisher started");
        Ok(())
    }

    /// Publish without a topic. Reaches subscribers with the empty filter.
    pub fn publish(&self, message: &Message) -> Result<()> {
        let frames = Envelope::broadcast(message.clone()).encode()?;
        self.send(&frames)
    }

    /// Publish to one topic.
    pub fn publish_topic(&self, topic: &str, message: &Message) -> Result<()> {
        let topic = Topic::new(topic)?;
        let frames = Envelope::addressed(topic, message.clone()).encode()?;
        self.send(&frames)
    }

    /// Publish the same message to each topic in order.
    ///
    /// Stops at the first failure. Messages already sent stay sent.
    pub fn publish_topics<S: AsRef<str>>(&self, topics: &[S], message: &Message) -> Result<()> {
        if topics.is_empty() {
            return Err(SessionError::EmptyTopicList);
        }
        for topic in topics {
            self.publish_topic(topic.as_ref(), message)?;
        }
        Ok(())
    }

    /// Close the socket, waiting for the transport to release the port.
    ///
    /// Fails with `NotStarted` when there is nothing to stop.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::stop_locked(&self.ctx, &self.config, &mut state)
    }

    fn send(&self, frames: &[Bytes]) -> Result<()> {
        let state = self.state.lock();
        let socket = state.socket.as_ref().ok_or(SessionError::NotStarted)?;
        socket
            .send_multipart(frames.iter().map(|frame| &frame[..]), 0)
            .map_err(TransportError::Send)?;
        Ok(())
    }

    fn stop_locked(ctx: &Context, config: &PublisherConfig, state: &mut PublisherState) -> Result<()> {
        let Some(socket) = state.socket.take() else {
            debug!("publisher not started; nothing to stop");
            return Err(SessionError::NotStarted);
        };
        state.keys.clear();
        match close_verified(ctx, socket, config.close_timeout) {
            Ok(CloseOutcome::Confirmed) => {
                info!("publisher stopped");
                Ok(())
            }
            Ok(CloseOutcome::Unconfirmed) => {
                info!("publisher stopped without close confirmation");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "publisher close could not be verified");
                Err(e.into())
            }
        }
    }
}

impl Drop for PublisherSession {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.socket.is_some() {
            let _ = Self::stop_locked(&self.ctx, &self.config, state);
        }
    }
}

impl std::fmt::Debug for PublisherSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherSession")
            .field("port", &self.port)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn stop_before_start_is_an_error() {
        let publisher = PublisherSession::new(Context::new(), 47321);
        assert_eq!(publisher.stop().unwrap_err().code(), ErrorCode::Error);
        assert!(!publisher.is_started());
    }

    #[test]
    fn publish_before_start_is_an_error() {
        let publisher = PublisherSession::new(Context::new(), 47322);
        let err = publisher.publish(&Message::raw(vec![1u8])).unwrap_err();
        assert!(matches!(err, SessionError::NotStarted));
        assert_eq!(err.code(), ErrorCode::Error);
    }

    #[test]
    fn topic_validation_precedes_send() {
        let publisher = PublisherSession::new(Context::new(), 47323);
        let message = Message::raw(vec![1u8]);
        assert_eq!(
            publisher.publish_topic("bad topic", &message).unwrap_err().code(),
            ErrorCode::InvalidTopic
        );
        assert_eq!(
            publisher.publish_topics::<&str>(&[], &message).unwrap_err().code(),
            ErrorCode::InvalidTopic
        );
    }

    #[test]
    fn start_is_idempotent_and_restartable() {
        let publisher = PublisherSession::new(Context::new(), 47324);
        publisher.start().unwrap();
        publisher.start().unwrap();
        assert!(publisher.is_started());
        publisher.stop().unwrap();
        assert!(publisher.stop().is_err());
        publisher.start().expect("port released by verified close");
        publisher.stop().unwrap();
    }

    #[test]
    fn bind_conflict_is_reported() {
        let ctx = Context::new();
        let first = PublisherSession::new(ctx.clone(), 47325);
        let second = PublisherSession::new(ctx, 47325);
        first.start().unwrap();
        let err = second.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Bind { .. })
        ));
        assert!(!second.is_started());
    }

    const SECRET: &str = "JTKVSB%%)wK0E.X)V>+}o?pNmC{O&4W4b!Ni{Lh6";

    #[test]
    fn short_server_key_is_rejected() {
        let publisher = PublisherSession::new(Context::new(), 47326);
        let err = publisher.set_server_secret_key("short").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Error);
        if has_curve() {
            assert!(matches!(err, SessionError::InvalidKey { actual: 5, .. }));
        } else {
            assert!(matches!(err, SessionError::SecurityUnsupported));
        }
    }

    #[test]
    fn failed_start_keeps_server_key_for_retry() {
        let ctx = Context::new();
        let holder = PublisherSession::new(ctx.clone(), 47327);
        holder.start().unwrap();

        let publisher = PublisherSession::new(ctx, 47327);
        publisher
            .state
            .lock()
            .keys
            .stage_server_secret(SECRET)
            .unwrap();
        assert!(publisher.start().is_err());
        assert!(!publisher.is_started());
        assert!(!publisher.state.lock().keys.is_empty());

        holder.stop().unwrap();
        if has_curve() {
            publisher.start().expect("retry after the port is released");
            assert!(publisher.state.lock().keys.is_empty());
            publisher.stop().unwrap();
        } else {
            // CURVE server mode is refused, so the retry fails rather than
            // binding an unsecured socket.
            assert!(publisher.start().is_err());
            assert!(!publisher.is_started());
        }
    }
}
