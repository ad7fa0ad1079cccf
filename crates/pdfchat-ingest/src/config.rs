//! Configuration for the ingestion service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::PlanTable;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "PDFCHAT_CONFIG";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Backend provider (local or remote)
    pub backend: BackendProvider,
    /// Server configuration
    pub server: ServerConfig,
    /// Relational database configuration
    pub database: DatabaseConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Processing configuration (timeouts, concurrency)
    pub processing: ProcessingConfig,
    /// Plan tiers and their per-document ceilings
    pub plans: PlanTable,
}

impl IngestConfig {
    /// Load configuration from a TOML file, then apply secrets from the environment.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_toml(&raw)?
            }
            Some(path) => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load using the path in `PDFCHAT_CONFIG`, if set
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    /// Parse a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Overlay API keys from the environment
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.embeddings.openai.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            self.vector_index.pinecone.api_key = Some(key);
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".to_string()));
        }
        if self.vector_index.upsert_batch_size == 0 {
            return Err(Error::Config("vector_index.upsert_batch_size must be > 0".to_string()));
        }
        if self.chunking.mode == ChunkingMode::Split
            && self.chunking.chunk_overlap >= self.chunking.chunk_size
        {
            return Err(Error::Config(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".to_string(),
            ));
        }
        self.plans.validate().map_err(Error::Config)?;

        if self.backend == BackendProvider::Remote {
            if self.embeddings.openai.api_key.is_none() {
                return Err(Error::Config(
                    "remote backend requires an OpenAI API key (OPENAI_API_KEY)".to_string(),
                ));
            }
            if self.vector_index.pinecone.index_host.is_empty() {
                return Err(Error::Config(
                    "remote backend requires vector_index.pinecone.index_host".to_string(),
                ));
            }
            if self.vector_index.pinecone.api_key.is_none() {
                return Err(Error::Config(
                    "remote backend requires a Pinecone API key (PINECONE_API_KEY)".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Ollama embeddings + SQLite vector table
    #[default]
    Local,
    /// OpenAI embeddings + Pinecone index
    Remote,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum trigger body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding file records, ingest jobs and local vectors
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdfchat-ingest")
            .join("ingest.db");
        Self { path }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions (1536 for ada-002)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for a single failed request (0 = none)
    pub max_retries: u32,
    /// OpenAI-compatible endpoint (remote backend)
    pub openai: OpenAiConfig,
    /// Ollama endpoint (local backend)
    pub ollama: OllamaConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            batch_size: 64,
            timeout_secs: 60,
            max_retries: 0,
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// OpenAI embeddings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    /// Read from OPENAI_API_KEY when not set in the file
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            api_key: None,
        }
    }
}

/// Ollama embeddings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// Deployment-wide namespace for all upserts
    pub namespace: String,
    /// Vectors per upsert request
    pub upsert_batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Pinecone index (remote backend)
    pub pinecone: PineconeConfig,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            namespace: "pdfchat".to_string(),
            upsert_batch_size: 100,
            timeout_secs: 60,
            pinecone: PineconeConfig::default(),
        }
    }
}

/// Pinecone data-plane endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// Index host, e.g. "https://jarvis-abc123.svc.us-east1-gcp.pinecone.io"
    pub index_host: String,
    /// Read from PINECONE_API_KEY when not set in the file
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// How page text is cut into indexed chunks
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMode {
    /// One chunk per page
    #[default]
    Page,
    /// Sentence-aware fixed-size chunks within each page
    Split,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub mode: ChunkingMode,
    /// Target chunk size in characters (split mode)
    pub chunk_size: usize,
    /// Overlap between chunks in characters (split mode)
    pub chunk_overlap: usize,
    /// Chunks shorter than this are merged away (split mode)
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: ChunkingMode::Page,
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 50,
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Budget for a whole run from fetch to index (default: 300 = 5 minutes)
    pub file_timeout_secs: u64,
    /// Budget for downloading the file
    pub fetch_timeout_secs: u64,
    /// Budget for PDF text extraction
    pub parse_timeout_secs: u64,
    /// Budget per embedding batch
    pub embed_timeout_secs: u64,
    /// Budget per upsert batch
    pub index_timeout_secs: u64,
    /// Number of documents processed at once (default: CPU count, max 8)
    pub max_concurrent_files: Option<usize>,
    /// Pending trigger events held before the endpoint applies backpressure
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            file_timeout_secs: 300,
            fetch_timeout_secs: 60,
            parse_timeout_secs: 60,
            embed_timeout_secs: 60,
            index_timeout_secs: 60,
            max_concurrent_files: None,
            queue_capacity: 256,
        }
    }
}

impl ProcessingConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    /// Worker concurrency, auto-detected from the CPU count when unset
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_files
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = IngestConfig::from_toml(
            r#"
            [server]
            port = 9000

            [chunking]
            mode = "split"
            chunk_size = 800

            [processing]
            file_timeout_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.chunking.mode, ChunkingMode::Split);
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.processing.file_timeout(), Duration::from_secs(120));
        assert_eq!(config.plans, PlanTable::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plan_table_from_toml() {
        let config = IngestConfig::from_toml(
            r#"
            [plans]
            paid_slug = "pro"
            free_slug = "free"

            [[plans.tiers]]
            name = "Free"
            slug = "free"
            quota = 10
            pages_per_pdf = 3
            max_file_size_bytes = 1048576

            [[plans.tiers]]
            name = "Pro"
            slug = "pro"
            quota = 50
            pages_per_pdf = 100
            max_file_size_bytes = 33554432
            "#,
        )
        .unwrap();

        assert_eq!(config.plans.tier("free").unwrap().pages_per_pdf, 3);
        assert_eq!(config.plans.tier("pro").unwrap().pages_per_pdf, 100);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = IngestConfig::default();
        config.embeddings.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.chunking.mode = ChunkingMode::Split;
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.backend = BackendProvider::Remote;
        config.embeddings.openai.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_err(), "missing pinecone host must be rejected");

        config.vector_index.pinecone.index_host = "https://idx.pinecone.io".to_string();
        config.vector_index.pinecone.api_key = Some("pc-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = IngestConfig::from_toml("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
