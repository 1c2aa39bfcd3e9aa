//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CompletionsConfig;
use crate::errors::{StudyPalError, StudyPalResult};
use crate::services::{ChatMessage, CompletionProvider};

pub struct OpenAiCompletionClient {
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompletionClient {
    pub fn new(config: &CompletionsConfig, api_key: String) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> StudyPalResult<String> {
        if messages.is_empty() {
            return Err(StudyPalError::InvalidInput(
                "completion prompt has no messages".into(),
            ));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(StudyPalError::CompletionService {
                status: status.as_u16(),
                body: err_body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        // A missing content field is a malformed response, not an empty
        // answer. Defaulting to "" here would hand the caller a placeholder
        // masquerading as a valid completion.
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| StudyPalError::CompletionService {
                status: status.as_u16(),
                body: "malformed response: missing choices[0].message.content".into(),
            })?;

        tracing::debug!(content_len = content.len(), "completion response received");
        Ok(content.to_string())
    }
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> StudyPalError {
    if e.is_timeout() {
        StudyPalError::Timeout(timeout)
    } else {
        StudyPalError::CompletionService {
            status: 0,
            body: format!("transport failure: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unresponsive_server_maps_to_timeout() {
        // Bound but never accepted: the connection lands in the listen
        // backlog and the request waits forever for a response.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let config = crate::config::CompletionsConfig {
            api_base: format!("http://{addr}/v1/chat/completions"),
            model: "llama3-8b-8192".into(),
            temperature: 0.1,
            api_key: None,
            timeout_secs: 1,
        };
        let client = OpenAiCompletionClient::new(&config, "test-key".into());

        let err = client
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        match err {
            StudyPalError::Timeout(d) => assert_eq!(d, Duration::from_secs(1)),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
