//! Collaborator trait definitions for the answer workflow

use crate::error::Result;
use crate::retrieval::RetrievedChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding generation trait
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Structured verdict for a single chunk's relevance to the current query
///
/// Schema for the grader's classification output. The test is deliberately
/// lenient: keyword or semantic overlap counts, the goal is only to filter
/// out entirely unrelated retrievals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelevanceVerdict {
    pub is_relevant: bool,
}

/// Per-chunk relevance classification trait
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    /// Classify one chunk against the current query
    async fn grade(&self, query: &str, chunk: &RetrievedChunk) -> Result<RelevanceVerdict>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Inputs to a query reformulation
#[derive(Debug, Clone)]
pub struct RewriteRequest<'a> {
    /// The user's question as originally asked
    pub original_question: &'a str,

    /// The query used for the most recent retrieval round
    pub current_query: &'a str,

    /// Relevant chunks accumulated so far (why retrieval was insufficient)
    pub relevant_found: usize,

    /// Which rewrite attempt this is, 1-based
    pub attempt: u32,
}

/// Query reformulation trait
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// Produce an improved retrieval query; guaranteed non-empty
    async fn rewrite(&self, request: &RewriteRequest<'_>) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// A technical term paired with its plain-language analogy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JargonEntry {
    pub term: String,
    pub analogy: String,
}

/// Term-to-analogy mapping, case-insensitively deduplicated on the term
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct JargonMap {
    entries: Vec<JargonEntry>,
}

impl JargonMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; a term already present (ignoring case) keeps its
    /// first analogy
    pub fn insert(&mut self, term: impl Into<String>, analogy: impl Into<String>) {
        let term = term.into();
        if self.contains(&term) {
            return;
        }
        self.entries.push(JargonEntry {
            term,
            analogy: analogy.into(),
        });
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.term.eq_ignore_ascii_case(term))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JargonEntry> {
        self.entries.iter()
    }
}

/// Jargon extraction and simplification trait
#[async_trait]
pub trait JargonTranslator: Send + Sync {
    /// Extract technical terms from the chunks and map each to a
    /// plain-language analogy; empty input yields an empty mapping
    async fn translate(&self, chunks: &[RetrievedChunk]) -> Result<JargonMap>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Final answer generation trait
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Generate the answer grounded only in the supplied chunks
    async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        jargon: &JargonMap,
    ) -> Result<String>;

    /// Get model name
    fn model_name(&self) -> &str;
}
