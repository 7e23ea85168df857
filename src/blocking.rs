//! Blocking call executor: one HTTP POST, one JSON response.

use serde_json::Value;

use crate::config::{ClientConfig, USER_AGENT_VALUE};
use crate::error::ClientError;
use crate::protocol::{END_OF_TEXT_MARKER, GenerateResponse};

pub(crate) struct BlockingExecutor {
    http: reqwest::Client,
    url: String,
}

impl BlockingExecutor {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: config.blocking_url(),
        })
    }

    /// Send one generate request and return the completion texts.
    pub(crate) async fn send(&self, payload: &Value) -> Result<Vec<String>, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|_| ClientError::InvalidResponseContent { raw: body })?;

        Ok(parsed
            .results
            .into_iter()
            .map(|result| {
                result
                    .text
                    .unwrap_or_default()
                    .replace(END_OF_TEXT_MARKER, "")
            })
            .collect())
    }
}
