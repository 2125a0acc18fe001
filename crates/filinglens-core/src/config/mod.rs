//! Configuration management

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm_service: LLMServiceConfig,

    /// Vector store configuration
    #[serde(default)]
    pub retriever: RetrieverConfig,

    /// Workflow loop configuration
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Base URL of the LLM service for chat/completions
    pub url: String,

    /// Model name for chat completions (grading, rewriting, translation, synthesis)
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Base URL for embeddings service (can be different from LLM URL)
    #[serde(default)]
    pub embedding_url: Option<String>,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensions (will be auto-detected if not specified)
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LLMServiceConfig {
    /// Get the embeddings URL (falls back to main URL if not specified)
    pub fn embeddings_url(&self) -> &str {
        self.embedding_url.as_deref().unwrap_or(&self.url)
    }
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("FILINGLENS_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: default_chat_model(),
            embedding_url: std::env::var("FILINGLENS_EMBEDDING_URL").ok(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: std::env::var("FILINGLENS_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok()),
            api_key: std::env::var("FILINGLENS_LLM_API_KEY").ok(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chat_model() -> String {
    std::env::var("FILINGLENS_LLM_MODEL")
        .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string())
}

fn default_embedding_model() -> String {
    std::env::var("FILINGLENS_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Chroma vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Base URL of the Chroma server
    pub url: String,

    /// Collection holding the ingested filing chunks
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Number of candidate chunks fetched per retrieval round
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("FILINGLENS_CHROMA_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            collection: std::env::var("FILINGLENS_COLLECTION")
                .unwrap_or_else(|_| default_collection()),
            top_k: default_top_k(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_collection() -> String {
    "sec_filings".to_string()
}

fn default_top_k() -> usize {
    4
}

/// Workflow loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum number of query rewrite cycles per question
    #[serde(default = "default_max_rewrites")]
    pub max_rewrites: u32,

    /// Minimum accumulated relevant chunks required to proceed to synthesis
    #[serde(default = "default_min_relevant")]
    pub min_relevant_chunks: usize,

    /// When true, ceiling exhaustion with zero relevant chunks is an error
    /// instead of a degraded answer
    #[serde(default)]
    pub strict: bool,

    /// Per-stage timeouts in seconds
    #[serde(default = "default_stage_timeout")]
    pub retrieval_timeout_secs: u64,
    #[serde(default = "default_stage_timeout")]
    pub grading_timeout_secs: u64,
    #[serde(default = "default_stage_timeout")]
    pub rewrite_timeout_secs: u64,
    #[serde(default = "default_stage_timeout")]
    pub translation_timeout_secs: u64,
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,
}

impl WorkflowConfig {
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    pub fn grading_timeout(&self) -> Duration {
        Duration::from_secs(self.grading_timeout_secs)
    }

    pub fn rewrite_timeout(&self) -> Duration {
        Duration::from_secs(self.rewrite_timeout_secs)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.translation_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_rewrites: default_max_rewrites(),
            min_relevant_chunks: default_min_relevant(),
            strict: false,
            retrieval_timeout_secs: default_stage_timeout(),
            grading_timeout_secs: default_stage_timeout(),
            rewrite_timeout_secs: default_stage_timeout(),
            translation_timeout_secs: default_stage_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
        }
    }
}

fn default_max_rewrites() -> u32 {
    3
}

fn default_min_relevant() -> usize {
    1
}

fn default_stage_timeout() -> u64 {
    30
}

fn default_synthesis_timeout() -> u64 {
    120
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path (falls back to defaults if missing)
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_rewrites, 3);
        assert_eq!(config.min_relevant_chunks, 1);
        assert!(!config.strict);
    }

    #[test]
    fn test_retriever_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.top_k, 4);
        assert_eq!(config.collection, "sec_filings");
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.workflow.strict = true;
        config.workflow.max_rewrites = 5;
        config.retriever.collection = "filings_2023".to_string();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert!(parsed.workflow.strict);
        assert_eq!(parsed.workflow.max_rewrites, 5);
        assert_eq!(parsed.retriever.collection, "filings_2023");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.workflow.max_rewrites, 3);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "workflow:\n  strict: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.workflow.strict);
        assert_eq!(config.workflow.max_rewrites, 3);
        assert_eq!(config.retriever.top_k, 4);
    }
}
