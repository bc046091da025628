//! Configuration surface: provider credentials, chunking and retrieval policy.
//!
//! Settings are read from an optional TOML file merged over defaults. The one
//! required credential (the provider API key) may instead come from the
//! `OPENAI_API_KEY` environment variable or an interactive prompt at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub index: IndexConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from the given file, or from the default location
    /// when none is given. A missing default file yields plain defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Default config file location (`<config dir>/lectern/config.toml`).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lectern").join("config.toml"))
    }

    /// Default data directory for the on-disk index.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("lectern"))
    }

    /// Fill the API key from the environment when the config file left it unset.
    pub fn resolve_api_key_from_env(&mut self) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }
}

/// Settings for the embedding/chat provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// API key; falls back to `OPENAI_API_KEY` or an interactive prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Embedding model identifier
    pub embedding_model: String,
    /// Requested embedding dimensionality (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
    /// Chat model used to synthesize answers
    pub chat_model: String,
    /// Sampling temperature for the answer model
    pub temperature: f32,
    /// Request timeout in seconds for provider calls
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Window size and overlap for the chunker, in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,
    /// Characters of overlap between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 200,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    pub top_k: usize,
    /// What a query against an empty index does
    pub empty_index: EmptyIndexPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            empty_index: EmptyIndexPolicy::default(),
        }
    }
}

/// Behavior of a query issued before any document was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyIndexPolicy {
    /// Return the fixed no-information answer
    #[default]
    Empty,
    /// Fail the query with an error
    Error,
}

/// Ingestion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// What ingesting an already-indexed file does
    pub reingest: ReingestPolicy,
}

/// Behavior when a file with the same name was already ingested.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// Leave the existing entries untouched and skip the file
    #[default]
    Skip,
    /// Re-embed the file, appending duplicate entries
    Duplicate,
}

/// Vector index storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// SQLite file backing the index; in-memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Embedded web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the web UI
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7351".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.empty_index, EmptyIndexPolicy::Empty);
        assert_eq!(config.ingest.reingest, ReingestPolicy::Skip);
        assert!(config.index.path.is_none());
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let raw = r#"
            [retrieval]
            top_k = 5
            empty_index = "error"

            [ingest]
            reingest = "duplicate"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.empty_index, EmptyIndexPolicy::Error);
        assert_eq!(config.ingest.reingest, ReingestPolicy::Duplicate);
        // untouched sections keep their defaults
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.provider.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }
}
