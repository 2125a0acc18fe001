//! Error types for filinglens

use crate::workflow::WorkflowStage;
use thiserror::Error;

/// Result type alias using FilingLensError
pub type Result<T> = std::result::Result<T, FilingLensError>;

/// Error type alias for convenience
pub type Error = FilingLensError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NO_EVIDENCE: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for filinglens
#[derive(Debug, Error)]
pub enum FilingLensError {
    #[error("Vector store unavailable: {0}")]
    RetrieverUnavailable(String),

    #[error("Grading output did not match the verdict schema: {0}")]
    GradingParse(String),

    #[error("LLM call failed during {stage}: {message}")]
    Upstream {
        stage: WorkflowStage,
        message: String,
    },

    #[error("No relevant evidence found after {rewrites} query rewrites")]
    NoEvidenceFound { rewrites: u32 },

    #[error("Workflow cancelled after {stage}")]
    Cancelled { stage: WorkflowStage },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl FilingLensError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoEvidenceFound { .. } => exit_codes::NO_EVIDENCE,
            Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
