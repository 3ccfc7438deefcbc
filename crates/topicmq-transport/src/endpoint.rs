//! Endpoint address construction.
//!
//! Publishers bind on every interface, subscribers connect to an explicit
//! host. Private control channels and monitors live on `inproc://` addresses
//! that must not collide between sessions of the same process.

use tracing::debug;

const TCP_PREFIX: &str = "tcp://";
const INPROC_PREFIX: &str = "inproc://";

/// Prefix for per-session shutdown-signal channels.
pub const SHUTDOWN_PREFIX: &str = "topicmq-shutdown";

/// Prefix for socket monitors used by verified close.
pub const MONITOR_PREFIX: &str = "topicmq-monitor";

/// Address a publisher binds to: `tcp://*:<port>`.
pub fn tcp_bind_address(port: u16) -> String {
    format!("{TCP_PREFIX}*:{port}")
}

/// Address a subscriber connects to: `tcp://<ip>:<port>`.
pub fn tcp_connect_address(ip: &str, port: u16) -> String {
    format!("{TCP_PREFIX}{ip}:{port}")
}

/// A process-local address with a random suffix.
pub fn unique_inproc_address(prefix: &str) -> String {
    let address = format!("{INPROC_PREFIX}{prefix}-{:016x}", rand::random::<u64>());
    debug!(%address, "allocated inproc address");
    address
}
