//! Retrieval-augmented question answering.
//!
//! Embeds the question, pulls the nearest chunks out of the vector index,
//! and asks the completion service with those chunks as context. When
//! retrieval comes back empty the question is still asked, bare, and the
//! answer is marked ungrounded.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::RetrievalConfig;
use crate::errors::{StudyPalError, StudyPalResult};
use crate::index::{RetrievalHit, VectorIndex};
use crate::services::{ChatMessage, CompletionProvider, EmbeddingProvider};

const SYSTEM_PROMPT: &str = "You are a personalized learning assistant. Answer the \
student's question using the provided study material excerpts. If the excerpts do \
not contain the answer, say so instead of inventing one.";

/// Generated answer plus the chunks that grounded it, for traceability.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub grounded: bool,
    /// Chunks the prompt was built from; empty when ungrounded.
    pub sources: Vec<RetrievalHit>,
}

pub struct QaOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    completions: Arc<dyn CompletionProvider>,
    index: Arc<Mutex<VectorIndex>>,
    retrieval: RetrievalConfig,
}

impl QaOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completions: Arc<dyn CompletionProvider>,
        index: Arc<Mutex<VectorIndex>>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            completions,
            index,
            retrieval,
        }
    }

    /// Answer a question, grounded in the index where possible.
    ///
    /// `top_k` overrides the configured retrieval depth for this call.
    /// Completion failures are surfaced unchanged; no retry, no fabricated
    /// fallback answer.
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> StudyPalResult<Answer> {
        if query.trim().is_empty() {
            return Err(StudyPalError::InvalidInput("query must not be empty".into()));
        }
        if top_k == Some(0) {
            return Err(StudyPalError::InvalidInput(
                "top_k must be greater than zero".into(),
            ));
        }
        let top_k = top_k.unwrap_or(self.retrieval.top_k);

        let inputs = [query.to_string()];
        let query_vec = self
            .embedder
            .embed(&inputs)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StudyPalError::EmbeddingService {
                status: 0,
                body: "embedding service returned no vector for the query".into(),
            })?;

        let hits = {
            let index = self.index.lock().await;
            index.query(&query_vec, top_k, self.retrieval.min_score)?
        };

        let grounded = !hits.is_empty();
        let messages = if grounded {
            tracing::debug!(hits = hits.len(), top_k, "building grounded prompt");
            build_grounded_prompt(query, &hits)
        } else {
            tracing::debug!("no chunks retrieved, asking ungrounded");
            vec![ChatMessage::user(query)]
        };

        let text = self.completions.complete(&messages).await?;

        tracing::info!(
            grounded,
            sources = hits.len(),
            answer_len = text.len(),
            "question answered"
        );

        Ok(Answer {
            text,
            grounded,
            sources: hits,
        })
    }
}

fn build_grounded_prompt(query: &str, hits: &[RetrievalHit]) -> Vec<ChatMessage> {
    let mut context = String::from("Study material excerpts:\n");
    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("\n[{}] {}\n", i + 1, hit.content));
    }

    vec![
        ChatMessage::system(format!("{SYSTEM_PROMPT}\n\n{context}")),
        ChatMessage::user(query),
    ]
}
