use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{StudyPalError, StudyPalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub embeddings: EmbeddingsConfig,
    pub completions: CompletionsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// When true, a page without an extractable text layer aborts the
    /// ingestion instead of being skipped.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub api_base: String,
    /// Model name sent to the API (e.g. "text-embedding-3-small").
    pub model: String,
    /// Fixed dimensionality of the vectors this model produces. All index
    /// entries must carry exactly this many components.
    pub dimensions: u32,
    /// Optional API key stored in config.toml (falls back to env var
    /// STUDYPAL_EMBEDDINGS_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionsConfig {
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (falls back to env var
    /// STUDYPAL_COMPLETIONS_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path of the SQLite database holding the vector index.
    pub db_path: PathBuf,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.1
}

// ~512 tokens at the usual 4 chars/token estimate.
fn default_max_chars() -> usize {
    2048
}

fn default_overlap_chars() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

impl EmbeddingsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CompletionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Reject configs with empty required fields before any client is built.
    pub fn validate(&self) -> StudyPalResult<()> {
        if self.embeddings.api_base.trim().is_empty() {
            return Err(StudyPalError::InvalidInput(
                "embeddings.api_base must not be empty".into(),
            ));
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(StudyPalError::InvalidInput(
                "embeddings.model must not be empty".into(),
            ));
        }
        if self.embeddings.dimensions == 0 {
            return Err(StudyPalError::InvalidInput(
                "embeddings.dimensions must be greater than zero".into(),
            ));
        }
        if self.completions.api_base.trim().is_empty() {
            return Err(StudyPalError::InvalidInput(
                "completions.api_base must not be empty".into(),
            ));
        }
        if self.completions.model.trim().is_empty() {
            return Err(StudyPalError::InvalidInput(
                "completions.model must not be empty".into(),
            ));
        }
        if self.chunking.max_chars == 0 {
            return Err(StudyPalError::InvalidInput(
                "chunking.max_chars must be greater than zero".into(),
            ));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(StudyPalError::InvalidInput(
                "chunking.overlap_chars must be smaller than chunking.max_chars".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(StudyPalError::InvalidInput(
                "retrieval.top_k must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Resolve the API key for a service: config.toml value first, then the
/// STUDYPAL_<SERVICE>_API_KEY environment variable.
pub fn resolve_api_key(service: &str, configured: Option<&str>) -> String {
    match configured {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => std::env::var(format!("STUDYPAL_{}_API_KEY", service.to_uppercase()))
            .unwrap_or_default(),
    }
}

fn resolve_config_path() -> StudyPalResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(StudyPalError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> StudyPalResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &std::path::Path) -> StudyPalResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    tracing::info!(
        path = %path.display(),
        embedding_model = %config.embeddings.model,
        completion_model = %config.completions.model,
        "config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            embeddings: EmbeddingsConfig {
                api_base: "https://api.openai.com/v1/embeddings".into(),
                model: "text-embedding-3-small".into(),
                dimensions: 1536,
                api_key: None,
                timeout_secs: 30,
            },
            completions: CompletionsConfig {
                api_base: "https://api.groq.com/openai/v1/chat/completions".into(),
                model: "llama3-8b-8192".into(),
                temperature: 0.1,
                api_key: None,
                timeout_secs: 30,
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            extraction: ExtractionConfig::default(),
            index: IndexConfig {
                db_path: PathBuf::from("studypal.db"),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn empty_model_rejected() {
        let mut cfg = sample_config();
        cfg.embeddings.model = String::new();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut cfg = sample_config();
        cfg.embeddings.dimensions = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut cfg = sample_config();
        cfg.chunking.overlap_chars = cfg.chunking.max_chars;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_src = r#"
            [embeddings]
            api_base = "https://api.openai.com/v1/embeddings"
            model = "text-embedding-3-small"
            dimensions = 1536

            [completions]
            api_base = "https://api.groq.com/openai/v1/chat/completions"
            model = "llama3-8b-8192"

            [index]
            db_path = "studypal.db"
        "#;
        let cfg: AppConfig = toml::from_str(toml_src).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.chunking.max_chars, 2048);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.completions.timeout_secs, 30);
    }
}
