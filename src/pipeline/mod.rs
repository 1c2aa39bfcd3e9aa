//! Ingestion pipeline: PDF bytes → text → chunks → embeddings → index.
//!
//! The pipeline walks a one-way state machine and never retries a step
//! itself; retry is the caller's concern. The vector index is only touched
//! in the single Persisting step, inside one transaction, so a failure at
//! any stage leaves the index exactly as it was before the ingestion began.

pub mod chunker;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::errors::{StudyPalError, StudyPalResult};
use crate::extract::{extract_pdf_text, EmptyPagePolicy};
use crate::index::{DocumentRecord, IndexEntry, VectorIndex};
use crate::services::EmbeddingProvider;

/// Pipeline stages, in the order they run. `Failed` is terminal and
/// reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    Idle,
    Extracting,
    Chunking,
    Embedding,
    Persisting,
    Complete,
    Failed,
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestState::Idle => "idle",
            IngestState::Extracting => "extracting",
            IngestState::Chunking => "chunking",
            IngestState::Embedding => "embedding",
            IngestState::Persisting => "persisting",
            IngestState::Complete => "complete",
            IngestState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller-supplied ingestion input. Goal and backstory are required
/// free-text metadata describing what the document is for.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub pdf_bytes: Vec<u8>,
    pub goal: String,
    pub backstory: String,
}

impl IngestionRequest {
    fn validate(&self) -> StudyPalResult<()> {
        if self.pdf_bytes.is_empty() {
            return Err(StudyPalError::InvalidInput("PDF byte stream is empty".into()));
        }
        if self.goal.trim().is_empty() {
            return Err(StudyPalError::InvalidInput("goal must not be empty".into()));
        }
        if self.backstory.trim().is_empty() {
            return Err(StudyPalError::InvalidInput(
                "backstory must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    /// Correlates this run's log lines.
    pub ingestion_id: Uuid,
    /// Content hash of the PDF bytes; re-ingesting the same bytes replaces
    /// the prior entries.
    pub doc_id: String,
    pub chunk_count: usize,
    pub page_count: usize,
    pub state: IngestState,
}

pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<Mutex<VectorIndex>>,
    chunking: ChunkingConfig,
    empty_pages: EmptyPagePolicy,
    /// Stage the most recent run reached; observable via [`Self::state`].
    state: std::sync::Mutex<IngestState>,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<Mutex<VectorIndex>>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking,
            empty_pages: EmptyPagePolicy::Skip,
            state: std::sync::Mutex::new(IngestState::Idle),
        }
    }

    pub fn with_empty_page_policy(mut self, policy: EmptyPagePolicy) -> Self {
        self.empty_pages = policy;
        self
    }

    /// Stage of the most recent ingestion: `Idle` before any run,
    /// `Complete` or `Failed` after one finishes.
    pub fn state(&self) -> IngestState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, state: IngestState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }

    /// Run one ingestion end to end.
    ///
    /// Empty extracted text is a no-op Complete with zero chunks, not an
    /// error. Any step failure is logged with the step name and propagated
    /// typed; the index is never left partially written.
    pub async fn ingest(&self, request: IngestionRequest) -> StudyPalResult<IngestionReport> {
        request.validate()?;

        let ingestion_id = Uuid::new_v4();
        let doc_id = content_hash(&request.pdf_bytes);
        tracing::info!(
            %ingestion_id,
            doc_id = %doc_id,
            bytes = request.pdf_bytes.len(),
            "ingestion started"
        );

        let extracted = self
            .step(ingestion_id, IngestState::Extracting, || {
                extract_pdf_text(&request.pdf_bytes, self.empty_pages)
            })?;

        // Chunk page-wise so a chunk never straddles a page boundary;
        // ordinals run across the whole document.
        let chunks = self.step(ingestion_id, IngestState::Chunking, || {
            Ok(extracted
                .pages
                .iter()
                .flat_map(|page| chunker::chunk_text(page, &self.chunking))
                .collect::<Vec<String>>())
        })?;

        if chunks.is_empty() {
            tracing::info!(%ingestion_id, doc_id = %doc_id, "no text to index, no-op ingestion");
            self.set_state(IngestState::Complete);
            return Ok(IngestionReport {
                ingestion_id,
                doc_id,
                chunk_count: 0,
                page_count: extracted.page_count,
                state: IngestState::Complete,
            });
        }

        self.set_state(IngestState::Embedding);
        let embeddings = match self.embedder.embed(&chunks).await {
            Ok(vectors) => vectors,
            Err(e) => return Err(self.fail(ingestion_id, IngestState::Embedding, e)),
        };

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (content, embedding))| IndexEntry {
                ordinal: ordinal as u32,
                content,
                embedding,
            })
            .collect();

        let document = DocumentRecord {
            doc_id: doc_id.clone(),
            goal: request.goal.clone(),
            backstory: request.backstory.clone(),
            page_count: extracted.page_count,
            ingested_at: Utc::now().to_rfc3339(),
        };

        let chunk_count = entries.len();
        {
            self.set_state(IngestState::Persisting);
            let mut index = self.index.lock().await;
            if let Err(e) = index.upsert(&document, &entries) {
                return Err(self.fail(ingestion_id, IngestState::Persisting, e));
            }
        }

        tracing::info!(
            %ingestion_id,
            doc_id = %doc_id,
            chunks = chunk_count,
            pages = document.page_count,
            "ingestion complete"
        );

        self.set_state(IngestState::Complete);
        Ok(IngestionReport {
            ingestion_id,
            doc_id,
            chunk_count,
            page_count: document.page_count,
            state: IngestState::Complete,
        })
    }

    fn step<T>(
        &self,
        ingestion_id: Uuid,
        state: IngestState,
        f: impl FnOnce() -> StudyPalResult<T>,
    ) -> StudyPalResult<T> {
        tracing::debug!(%ingestion_id, step = %state, "entering step");
        self.set_state(state);
        f().map_err(|e| self.fail(ingestion_id, state, e))
    }

    fn fail(&self, ingestion_id: Uuid, step: IngestState, e: StudyPalError) -> StudyPalError {
        self.set_state(IngestState::Failed);
        tracing::error!(%ingestion_id, step = %step, error = %e, "ingestion failed");
        e
    }
}

/// Stable document identity: SHA-256 of the PDF bytes, hex-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}
