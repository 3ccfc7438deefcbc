//! CURVE key staging.
//!
//! Keys are staged as fixed 40-byte buffers and applied to a socket when the
//! session starts. They are wiped once the socket they were applied to is
//! bound or connected; a failed start keeps them staged for the next attempt.
//! Strings passed in by the caller are outside our control and are not wiped.

use std::fmt;

use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use topicmq_transport::set_option;

use crate::error::{Result, SessionError};

/// Length of a Z85-encoded CURVE key.
pub const KEY_LEN: usize = 40;

/// One staged key.
///
/// The buffer is zeroed when the key is dropped.
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    /// Copy a 40-character Z85 key into a fixed buffer.
    ///
    /// `which` names the key in the error (e.g. "server public").
    pub fn parse(which: &'static str, key: &str) -> Result<Self> {
        if key.len() != KEY_LEN || !key.is_ascii() {
            return Err(SessionError::InvalidKey {
                which,
                expected: KEY_LEN,
                actual: key.chars().count(),
            });
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(key.as_bytes());
        Ok(Self { bytes })
    }

    /// The Z85 text of the key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    fn duplicate(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
        }
    }

    fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

/// Client side keys: the publisher's public key and this subscriber's pair.
///
/// Dropping the keys zeroes their buffers.
#[derive(Debug, Default)]
pub struct ClientKeys {
    server_public: Option<Key>,
    client_public: Option<Key>,
    client_secret: Option<Key>,
}

impl ClientKeys {
    /// Whether no key is present.
    pub fn is_empty(&self) -> bool {
        self.server_public.is_none() && self.client_public.is_none() && self.client_secret.is_none()
    }

    /// Apply to a connecting socket.
    ///
    /// Order: server public key, client public key, client secret key.
    pub fn apply(&self, socket: &zmq::Socket) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if let Some(key) = &self.server_public {
            set_option("ZMQ_CURVE_SERVERKEY", socket.set_curve_serverkey(key.as_bytes()))?;
        }
        if let Some(key) = &self.client_public {
            set_option("ZMQ_CURVE_PUBLICKEY", socket.set_curve_publickey(key.as_bytes()))?;
        }
        if let Some(key) = &self.client_secret {
            set_option("ZMQ_CURVE_SECRETKEY", socket.set_curve_secretkey(key.as_bytes()))?;
        }
        debug!("client keys applied");
        Ok(())
    }

    fn duplicate(&self) -> Self {
        Self {
            server_public: self.server_public.as_ref().map(Key::duplicate),
            client_public: self.client_public.as_ref().map(Key::duplicate),
            client_secret: self.client_secret.as_ref().map(Key::duplicate),
        }
    }

    fn wipe(&mut self) {
        for key in [
            &mut self.server_public,
            &mut self.client_public,
            &mut self.client_secret,
        ] {
            if let Some(mut staged) = key.take() {
                staged.wipe();
            }
        }
    }
}

/// Keys staged on a session between construction and `start()`.
#[derive(Default)]
pub struct KeyStore {
    client: ClientKeys,
    server_secret: Option<Key>,
}

impl KeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the publisher's public key, used by a subscriber to authenticate it.
    pub fn stage_server_public(&mut self, key: &str) -> Result<()> {
        let key = Key::parse("server public", key)?;
        self.client.server_public = Some(key);
        Ok(())
    }

    /// Stage the subscriber's own keypair.
    ///
    /// Both keys are checked before either is staged.
    pub fn stage_client(&mut self, secret: &str, public: &str) -> Result<()> {
        let secret = Key::parse("client secret", secret)?;
        let public = Key::parse("client public", public)?;
        self.client.client_secret = Some(secret);
        self.client.client_public = Some(public);
        Ok(())
    }

    /// Stage the publisher's secret key.
    pub fn stage_server_secret(&mut self, key: &str) -> Result<()> {
        let key = Key::parse("server secret", key)?;
        self.server_secret = Some(key);
        Ok(())
    }

    /// Apply the staged client keys to a connecting socket.
    ///
    /// The keys stay staged until [`wipe_client`](Self::wipe_client).
    pub fn apply_client(&self, socket: &zmq::Socket) -> Result<()> {
        self.client.apply(socket)
    }

    /// Copy of the staged client keys, for a socket owned by another thread.
    pub fn client_copy(&self) -> ClientKeys {
        self.client.duplicate()
    }

    /// Wipe the client keys once the socket they were applied to is connected.
    pub fn wipe_client(&mut self) {
        self.client.wipe();
    }

    /// Apply the staged server secret to a binding socket.
    ///
    /// Switches the socket to CURVE server mode. No-op when nothing is
    /// staged. The key stays staged until [`wipe_server`](Self::wipe_server).
    pub fn apply_server(&self, socket: &zmq::Socket) -> Result<()> {
        let Some(key) = &self.server_secret else {
            return Ok(());
        };
        set_option("ZMQ_CURVE_SERVER", socket.set_curve_server(true))?;
        set_option("ZMQ_CURVE_SECRETKEY", socket.set_curve_secretkey(key.as_bytes()))?;
        debug!("server key applied");
        Ok(())
    }

    /// Wipe the server secret once the socket it was applied to is bound.
    pub fn wipe_server(&mut self) {
        if let Some(mut key) = self.server_secret.take() {
            key.wipe();
        }
    }

    /// Whether any key is staged.
    pub fn is_empty(&self) -> bool {
        self.client.is_empty() && self.server_secret.is_none()
    }

    /// Wipe and drop all staged keys.
    pub fn clear(&mut self) {
        self.wipe_client();
        self.wipe_server();
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn state(key: &Option<Key>) -> &'static str {
            if key.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("KeyStore")
            .field("server_public", &state(&self.client.server_public))
            .field("client_public", &state(&self.client.client_public))
            .field("client_secret", &state(&self.client.client_secret))
            .field("server_secret", &state(&self.server_secret))
            .finish()
    }
}
