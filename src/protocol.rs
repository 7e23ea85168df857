//! Wire types for the generation service.
//!
//! The blocking path is plain JSON over HTTP; the streaming path pushes JSON
//! text messages over a duplex connection, each tagged with an `event`
//! discriminator and a monotonically increasing `message_num`.

use serde::{Deserialize, Serialize};

pub const TEXT_STREAM_EVENT: &str = "text_stream";
pub const STREAM_END_EVENT: &str = "stream_end";

/// End-of-text marker some models emit; stripped from blocking results.
pub const END_OF_TEXT_MARKER: &str = "<|endoftext|>";

/// Response body of the blocking generate endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub results: Vec<GeneratedText>,
}

/// One generated completion.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedText {
    pub text: Option<String>,
}

/// One decoded streaming message.
///
/// `event` is required; the remaining fields default so that end events
/// (which carry no text) and future event shapes still decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamPayload {
    pub event: String,
    #[serde(default)]
    pub message_num: u64,
    #[serde(default)]
    pub text: String,
}

/// Classified streaming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of generated text with its sequence index.
    Text { message_num: u64, text: String },
    /// Terminal event; no further text follows.
    End { message_num: u64 },
    /// An event this client does not recognize. Ignored, not an error.
    Other,
}

impl StreamPayload {
    pub fn classify(self) -> StreamEvent {
        match self.event.as_str() {
            TEXT_STREAM_EVENT => StreamEvent::Text {
                message_num: self.message_num,
                text: self.text,
            },
            STREAM_END_EVENT => StreamEvent::End {
                message_num: self.message_num,
            },
            _ => StreamEvent::Other,
        }
    }
}
