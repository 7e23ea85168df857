//! Error taxonomy for client calls.

/// Failure of a blocking or streaming completion call.
///
/// Transport sources (reqwest, tungstenite, io) are stringified rather than
/// exposed, so the public API does not leak the underlying stack.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network-layer failure: connect, send, or receive. Not retried
    /// internally; callers decide whether to retry.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote service answered with a non-success HTTP status.
    #[error("remote returned status {status}: {body}")]
    Remote { status: u16, body: String },

    /// A payload that failed to decode against the expected schema.
    /// Carries the raw payload for diagnostics.
    #[error("response did not match expected schema: {raw}")]
    InvalidResponseContent { raw: String },

    /// A streamed message arrived with an unexpected index.
    /// Fatal to the streaming session.
    #[error("out-of-order stream message: expected index {expected}, got {got}")]
    ProtocolOrderingViolation { expected: u64, got: u64 },

    /// No pooled connection available under the fail-fast pool policy.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The call was cancelled by the caller or by client shutdown.
    #[error("call cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
