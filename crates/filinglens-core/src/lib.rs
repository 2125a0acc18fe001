//! Filinglens Core Library
//!
//! Question answering over ingested SEC filings.
//!
//! # Features
//! - Vector retrieval against a Chroma collection of filing chunks
//! - LLM relevance grading with schema-validated verdicts
//! - Adaptive query rewriting with a hard retry ceiling
//! - Jargon simplification and grounded answer synthesis
//!
//! The ingestion side (fetching filings, chunking, embedding) is a separate
//! pipeline; this crate only consumes the populated vector store.

pub mod config;
pub mod error;
pub mod llm;
pub mod retrieval;
pub mod workflow;

pub use config::{Config, LLMServiceConfig, RetrieverConfig, WorkflowConfig};
pub use error::{Error, FilingLensError, Result};
pub use llm::{
    ChatMessage, Embedder, HttpEmbedder, HttpJargonTranslator, HttpQueryRewriter,
    HttpRelevanceGrader, HttpSynthesizer, JargonEntry, JargonMap, JargonTranslator, LLMClient,
    MetricsSnapshot, QueryRewriter, RelevanceGrader, RelevanceVerdict, RewriteRequest,
    Synthesizer, VLLMClient,
};
pub use retrieval::{ChromaRetriever, ChunkSource, RetrievedChunk, Retriever};
pub use workflow::{
    CancelToken, FinalResponse, WorkflowController, WorkflowStage, INSUFFICIENT_EVIDENCE_ANSWER,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "filinglens";
