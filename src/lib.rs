//! kobold-client: async client for KoboldCpp-compatible text generation
//! services.
//!
//! Two call paths: a blocking HTTP POST and a streamed generation over a
//! pooled duplex connection. Streaming sessions yield ordered text
//! increments; idle connections are reused across sessions and reaped after
//! a configurable quiet period.

mod blocking;
mod client;
mod config;
mod error;
mod reaper;

pub mod admission;
pub mod pool;
pub mod presets;
pub mod protocol;
pub mod request;
pub mod stream;
pub mod transport;

pub use client::Client;
pub use config::{BLOCKING_PATH, STREAMING_PATH, ClientConfig, ExhaustionPolicy};
pub use error::ClientError;
pub use request::CompletionRequest;
pub use stream::{CompletionStream, TextIncrement};

pub use tokio_util::sync::CancellationToken;
