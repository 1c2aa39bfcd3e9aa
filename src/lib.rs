//! StudyPal core: PDF ingestion and retrieval-augmented question answering.
//!
//! The upload surface (UI, CLI) talks to exactly two entry points:
//! [`StudyPal::ingest`] and [`StudyPal::answer`]. Everything in between —
//! extraction, chunking, embedding, the durable vector index, prompt
//! construction — lives behind them.

pub mod config;
pub mod errors;
pub mod extract;
pub mod index;
pub mod pipeline;
pub mod qa;
pub mod services;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::errors::StudyPalResult;
use crate::extract::EmptyPagePolicy;
use crate::index::{IndexStats, VectorIndex};
use crate::pipeline::{IngestionPipeline, IngestionReport, IngestionRequest};
use crate::qa::{Answer, QaOrchestrator};
use crate::services::completions::OpenAiCompletionClient;
use crate::services::embeddings::OpenAiEmbeddingClient;
use crate::services::{CompletionProvider, EmbeddingProvider};

pub use crate::errors::StudyPalError;

/// Facade wiring the ingestion pipeline and QA orchestrator over one
/// shared vector index. Service clients are injected once at construction;
/// nothing reads credentials from ambient state after that.
pub struct StudyPal {
    pipeline: IngestionPipeline,
    qa: QaOrchestrator,
    index: Arc<Mutex<VectorIndex>>,
}

impl std::fmt::Debug for StudyPal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyPal").finish_non_exhaustive()
    }
}

impl StudyPal {
    /// Build from validated config, constructing the real HTTP clients.
    pub fn from_config(config: &AppConfig) -> StudyPalResult<Self> {
        config.validate()?;

        let embed_key = config::resolve_api_key("embeddings", config.embeddings.api_key.as_deref());
        let complete_key =
            config::resolve_api_key("completions", config.completions.api_key.as_deref());

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAiEmbeddingClient::new(&config.embeddings, embed_key));
        let completions: Arc<dyn CompletionProvider> =
            Arc::new(OpenAiCompletionClient::new(&config.completions, complete_key));

        let index = VectorIndex::open(&config.index.db_path, config.embeddings.dimensions)?;
        Self::new(embedder, completions, index, config)
    }

    /// Build with injected providers (tests use in-process fakes here).
    ///
    /// The provider's vector size must match the index's, otherwise every
    /// ingest and query would fail later with a dimension error anyway.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completions: Arc<dyn CompletionProvider>,
        index: VectorIndex,
        config: &AppConfig,
    ) -> StudyPalResult<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(StudyPalError::Config(format!(
                "embedding provider produces {}-dimensional vectors, index holds {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }
        let index = Arc::new(Mutex::new(index));
        let empty_pages = if config.extraction.strict {
            EmptyPagePolicy::Fail
        } else {
            EmptyPagePolicy::Skip
        };
        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            index.clone(),
            config.chunking.clone(),
        )
        .with_empty_page_policy(empty_pages);
        let qa = QaOrchestrator::new(
            embedder,
            completions,
            index.clone(),
            config.retrieval.clone(),
        );
        Ok(Self {
            pipeline,
            qa,
            index,
        })
    }

    /// Ingest one PDF with its goal/backstory metadata.
    pub async fn ingest(&self, request: IngestionRequest) -> StudyPalResult<IngestionReport> {
        self.pipeline.ingest(request).await
    }

    /// Answer a question, grounded in the ingested material where possible.
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> StudyPalResult<Answer> {
        self.qa.answer(query, top_k).await
    }

    pub async fn stats(&self) -> StudyPalResult<IndexStats> {
        self.index.lock().await.stats()
    }
}
