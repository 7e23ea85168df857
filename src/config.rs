//! Client configuration.

use std::time::Duration;

/// User-agent sent on both transports.
pub(crate) const USER_AGENT_VALUE: &str = concat!("kobold-client/", env!("CARGO_PKG_VERSION"));

/// Path for blocking generation requests.
pub const BLOCKING_PATH: &str = "/api/v1/generate";

/// Path for the streaming websocket endpoint.
pub const STREAMING_PATH: &str = "/api/v1/stream";

/// What `ConnectionPool::lease` does when every connection is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Suspend until a connection is returned or capacity frees up.
    Wait,
    /// Fail immediately with `ClientError::PoolExhausted`.
    FailFast,
}

/// Immutable client policy. Set once at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote endpoint host.
    pub host: String,
    /// Port for blocking HTTP requests.
    pub blocking_port: u16,
    /// Port for the streaming websocket endpoint.
    pub streaming_port: u16,
    /// Maximum concurrent calls against the service. 0 means unbounded
    /// (outstanding calls are still counted exactly).
    pub max_concurrency: usize,
    /// Maximum pooled duplex connections (leased + idle). Must be at least 1.
    pub max_connections: usize,
    /// Behavior when the pool is at capacity with nothing idle.
    pub exhaustion_policy: ExhaustionPolicy,
    /// Idle period after which pooled connections are closed and evicted.
    pub idle_eviction: Duration,
    /// Read buffer capacity for reassembling streamed frames.
    pub stream_buffer_size: usize,
    /// Overall timeout for a blocking request, and for the websocket
    /// connect handshake.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            blocking_port: 5001,
            streaming_port: 5005,
            max_concurrency: 0,
            max_connections: 4,
            exhaustion_policy: ExhaustionPolicy::Wait,
            idle_eviction: Duration::from_secs(30),
            stream_buffer_size: 2048,
            request_timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl ClientConfig {
    pub fn blocking_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.blocking_port, BLOCKING_PATH)
    }

    pub fn streaming_url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.streaming_port, STREAMING_PATH)
    }
}
