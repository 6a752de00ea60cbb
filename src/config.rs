//! Configuration for SupportDesk components
//!
//! Binaries populate these from command-line flags and `SUPPORTDESK_*`
//! environment variables; tests build them directly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};

/// Configuration for the storage engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database, or ":memory:"
    pub db_path: String,
    /// Use WAL journaling (disable for network filesystems)
    #[serde(default = "default_true")]
    pub wal: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            wal: true,
        }
    }
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend: "hashed" (offline) or "openai"
    pub model: String,
    /// API key (for openai backend)
    pub api_key: Option<String>,
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
    /// Embedding model name override
    pub embedding_model: Option<String>,
    /// Embedding dimensions (must match model output)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "hashed".to_string(),
            api_key: None,
            base_url: None,
            embedding_model: None,
            dimensions: 384,
        }
    }
}

/// Configuration for the chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend: "openai" or "none"
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Maximum upload size in bytes (10 MB default)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Configuration for document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DeskError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DeskError::Config(
                "chunk_overlap must be less than chunk_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for similarity retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks returned for a plain search
    pub k: usize,
    /// Chunks fed to the document Q&A agent
    pub qa_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            qa_k: 6,
            min_score: 0.3,
        }
    }
}

/// Aggregate configuration for a desk instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Root for uploads and generated forms
    pub data_dir: PathBuf,
    /// Base URL the widget talks to
    pub public_base_url: String,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("supportdesk-data"),
            public_base_url: "http://localhost:8000".to_string(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl DeskConfig {
    /// Config rooted at `data_dir` with the database inside it
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let db_path = data_dir.join("supportdesk.db").to_string_lossy().to_string();
        Self {
            storage: StorageConfig {
                db_path,
                wal: true,
            },
            data_dir,
            ..Self::default()
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn forms_dir(&self) -> PathBuf {
        self.data_dir.join("forms")
    }

    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()?;
        if self.retrieval.k == 0 || self.retrieval.qa_k == 0 {
            return Err(DeskError::Config("retrieval k must be at least 1".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(DeskError::Config(
                "retrieval min_score must be within [-1, 1]".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(DeskError::Config(
                "embedding dimensions must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        DeskConfig::default().validate().unwrap();
        let ingest = IngestConfig::default();
        assert_eq!(ingest.chunk_size, 1000);
        assert_eq!(ingest.chunk_overlap, 150);
    }

    #[test]
    fn test_overlap_must_be_smaller() {
        let mut config = DeskConfig::default();
        config.ingest.chunk_size = 200;
        config.ingest.chunk_overlap = 200;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_data_dir_layout() {
        let config = DeskConfig::with_data_dir("/var/lib/desk");
        assert_eq!(config.storage.db_path, "/var/lib/desk/supportdesk.db");
        assert_eq!(config.uploads_dir(), PathBuf::from("/var/lib/desk/uploads"));
        assert_eq!(config.forms_dir(), PathBuf::from("/var/lib/desk/forms"));
    }
}
