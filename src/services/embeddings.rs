//! HTTP client for an OpenAI-compatible embeddings endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingsConfig;
use crate::errors::{StudyPalError, StudyPalResult};
use crate::services::EmbeddingProvider;

pub struct OpenAiEmbeddingClient {
    api_base: String,
    api_key: String,
    model: String,
    dimensions: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: &EmbeddingsConfig, api_key: String) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            timeout: config.timeout(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed(&self, inputs: &[String]) -> StudyPalResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Err(StudyPalError::InvalidInput(
                "embedding input batch is empty".into(),
            ));
        }
        if let Some(pos) = inputs.iter().position(|s| s.trim().is_empty()) {
            return Err(StudyPalError::InvalidInput(format!(
                "embedding input {pos} is blank"
            )));
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        tracing::debug!(
            model = %self.model,
            batch = inputs.len(),
            "sending embedding request"
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
            return Err(StudyPalError::EmbeddingService {
                status: status.as_u16(),
                body: err_body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let vectors = parse_embedding_response(&json, inputs.len(), status.as_u16())?;
        if let Some(bad) = vectors.iter().find(|v| v.len() as u32 != self.dimensions) {
            return Err(StudyPalError::Config(format!(
                "embedding model '{}' returned {}-dimensional vectors, configured for {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        tracing::debug!(batch = vectors.len(), "embedding response received");
        Ok(vectors)
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }
}

/// Pull the embedding vectors out of a response body, reassembled by the
/// response's own `index` field so ordering matches the input batch even
/// if the service returns data out of order. Anything unexpected in the
/// payload is a typed error; values are never silently defaulted.
fn parse_embedding_response(
    json: &serde_json::Value,
    expected: usize,
    status: u16,
) -> StudyPalResult<Vec<Vec<f32>>> {
    let malformed = |body: String| StudyPalError::EmbeddingService { status, body };

    let data = json["data"]
        .as_array()
        .ok_or_else(|| malformed("malformed response: missing 'data' array".into()))?;

    if data.len() != expected {
        return Err(malformed(format!(
            "malformed response: {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }

    let mut vectors: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, datum) in data.iter().enumerate() {
        let slot = datum["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
        let values = datum["embedding"].as_array().ok_or_else(|| {
            malformed(format!(
                "malformed response: datum {pos} has no 'embedding' field"
            ))
        })?;

        let mut embedding = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let number = value.as_f64().ok_or_else(|| {
                malformed(format!(
                    "malformed response: non-numeric value at position {i} of embedding {pos}"
                ))
            })?;
            embedding.push(number as f32);
        }

        if slot >= vectors.len() || vectors[slot].is_some() {
            return Err(malformed(format!(
                "malformed response: bad or duplicate index {slot}"
            )));
        }
        vectors[slot] = Some(embedding);
    }

    let vectors: Vec<Vec<f32>> = vectors.into_iter().flatten().collect();
    if vectors.len() != expected {
        return Err(malformed(
            "malformed response: missing embeddings for some inputs".into(),
        ));
    }
    Ok(vectors)
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> StudyPalError {
    if e.is_timeout() {
        StudyPalError::Timeout(timeout)
    } else {
        StudyPalError::EmbeddingService {
            status: 0,
            body: format!("transport failure: {e}"),
        }
    }
}
