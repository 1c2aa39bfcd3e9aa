use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyPalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding service error ({status}): {body}")]
    EmbeddingService { status: u16, body: String },

    #[error("Completion service error ({status}): {body}")]
    CompletionService { status: u16, body: String },

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl StudyPalError {
    /// Stable machine-readable kind, surfaced to the UI layer together
    /// with the display message.
    pub fn kind(&self) -> &'static str {
        match self {
            StudyPalError::InvalidInput(_) => "invalid_input",
            StudyPalError::Config(_) => "config",
            StudyPalError::Extraction(_) => "extraction",
            StudyPalError::EmbeddingService { .. } => "embedding_service",
            StudyPalError::CompletionService { .. } => "completion_service",
            StudyPalError::IndexUnavailable(_) => "index_unavailable",
            StudyPalError::Timeout(_) => "timeout",
            StudyPalError::Io(_) => "io",
            StudyPalError::Json(_) => "json",
            StudyPalError::Sqlite(_) => "sqlite",
            StudyPalError::TomlDe(_) => "toml",
        }
    }
}

impl serde::Serialize for StudyPalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type StudyPalResult<T> = Result<T, StudyPalError>;
