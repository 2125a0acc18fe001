//! LLM integration
//!
//! Provides traits and implementations for:
//! - Chat completion and embedding via external services (vLLM, OpenAI, etc.)
//! - Relevance grading with schema-validated verdicts
//! - Query rewriting
//! - Jargon extraction and simplification
//! - Answer synthesis

mod cache;
mod client;
mod grader;
mod jargon;
mod rewriter;
mod synthesizer;
mod traits;

pub use client::{APIMetrics, ChatMessage, HttpEmbedder, LLMClient, MetricsSnapshot, VLLMClient};
pub use grader::HttpRelevanceGrader;
pub use jargon::HttpJargonTranslator;
pub use rewriter::HttpQueryRewriter;
pub use synthesizer::HttpSynthesizer;
pub use traits::*;
