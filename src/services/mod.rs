//! Remote service clients and the trait seams the pipeline and QA
//! orchestrator depend on, so tests can substitute in-process fakes.

pub mod completions;
pub mod embeddings;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StudyPalResult;

/// One role-tagged message of a chat-completion prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Maps a batch of texts to one fixed-length vector each, order-preserving.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> StudyPalResult<Vec<Vec<f32>>>;

    /// Fixed dimensionality of the vectors this provider produces.
    fn dimensions(&self) -> u32;
}

/// Sends a prompt to a chat-completion service and returns the generated
/// text. Implementations must surface failures as typed errors, never as a
/// placeholder string.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> StudyPalResult<String>;
}
