//! Request payload assembly.
//!
//! A request is a named preset merged with the prompt and a handful of
//! per-call keys. The merge result is what goes on the wire, for both the
//! blocking and the streaming path.

use serde_json::{Value, json};

use crate::presets::{Preset, default_preset};

/// A completion request: prompt text plus generation parameters.
///
/// Parameters come from a [`Preset`] (default `"[Default]"`) and are opaque
/// to this crate; the service interprets them.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    prompt: String,
    preset: Preset,
    stop_sequences: Vec<String>,
    n: u32,
    max_context_length: u32,
    max_length: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            preset: default_preset().clone(),
            stop_sequences: Vec::new(),
            n: 1,
            max_context_length: 8192,
            max_length: 4096,
        }
    }

    /// Replace the generation parameters with another preset.
    pub fn with_preset(mut self, preset: &Preset) -> Self {
        self.preset = preset.clone();
        self
    }

    /// Sequences that stop generation, in addition to the service defaults.
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    /// Prompt-side context window limit.
    pub fn with_max_context_length(mut self, tokens: u32) -> Self {
        self.max_context_length = tokens;
        self
    }

    /// Upper bound on generated tokens.
    pub fn with_max_length(mut self, tokens: u32) -> Self {
        self.max_length = tokens;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Serialize into the JSON object the service expects: the preset's
    /// fields plus `prompt`, `n`, `max_context_length`, `max_length`, and
    /// `stop_sequence`.
    pub fn to_payload(&self) -> Value {
        let mut object = match serde_json::to_value(&self.preset) {
            Ok(Value::Object(object)) => object,
            _ => unreachable!("presets serialize to JSON objects"),
        };
        object.insert("prompt".to_string(), json!(self.prompt));
        object.insert("n".to_string(), json!(self.n));
        object.insert(
            "max_context_length".to_string(),
            json!(self.max_context_length),
        );
        object.insert("max_length".to_string(), json!(self.max_length));
        object.insert("stop_sequence".to_string(), json!(self.stop_sequences));
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::preset;

    #[test]
    fn payload_merges_preset_and_call_keys() {
        let payload = CompletionRequest::new("Once upon a time")
            .with_stop_sequences(vec!["\nUser:".to_string()])
            .to_payload();

        assert_eq!(payload["prompt"], "Once upon a time");
        assert_eq!(payload["n"], 1);
        assert_eq!(payload["max_context_length"], 8192);
        assert_eq!(payload["max_length"], 4096);
        assert_eq!(payload["stop_sequence"], json!(["\nUser:"]));
        // Preset keys ride along untouched.
        assert_eq!(payload["temp"], 0.7);
        assert_eq!(payload["rep_pen_range"], 256);
    }

    #[test]
    fn with_preset_swaps_parameters() {
        let godlike = preset("Godlike").unwrap();
        let payload = CompletionRequest::new("x").with_preset(godlike).to_payload();
        assert_eq!(payload["top_a"], 0.75);
        assert_eq!(payload["description"], "Makes AI give a descriptive and sensual output.");
    }

    #[test]
    fn overrides_apply() {
        let payload = CompletionRequest::new("x")
            .with_max_context_length(2048)
            .with_max_length(256)
            .to_payload();
        assert_eq!(payload["max_context_length"], 2048);
        assert_eq!(payload["max_length"], 256);
    }

    #[test]
    fn default_payload_snapshot() {
        let payload = CompletionRequest::new("Hello").to_payload();
        insta::assert_json_snapshot!(payload);
    }
}
