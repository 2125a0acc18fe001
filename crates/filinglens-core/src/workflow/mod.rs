//! The answer workflow
//!
//! A cyclic state machine: retrieve candidate chunks, grade them, and either
//! synthesize an answer or rewrite the query and retrieve again, bounded by a
//! hard rewrite ceiling. The machine is expressed as explicit tagged steps so
//! termination is checkable by inspection.

mod controller;

pub use controller::WorkflowController;

use crate::config::WorkflowConfig;
use crate::llm::JargonMap;
use crate::retrieval::RetrievedChunk;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stage names, emitted on the progress channel after each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    Retrieving,
    Grading,
    Deciding,
    Rewriting,
    Translating,
    Synthesizing,
    Done,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieving => "RETRIEVING",
            Self::Grading => "GRADING",
            Self::Deciding => "DECIDING",
            Self::Rewriting => "REWRITING",
            Self::Translating => "TRANSLATING",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation signal, checked between stages
///
/// An in-flight collaborator call is allowed to complete; its result is
/// discarded and no further transitions happen.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The single mutable record threaded through one workflow execution
///
/// Created per user turn, dropped at the end; nothing persists across turns.
#[derive(Debug)]
pub struct WorkflowState {
    /// The question as originally asked, preserved for synthesis context
    pub original_question: String,

    /// The query driving the current retrieval round
    pub current_query: String,

    /// Relevant chunks accumulated across rounds, first-seen order
    pub relevant_chunks: Vec<RetrievedChunk>,

    /// Chunk ids already accumulated, for cross-round deduplication
    seen_ids: HashSet<String>,

    /// Queries already issued, lowercased, to detect a stuck rewriter
    used_queries: HashSet<String>,

    /// Completed rewrite cycles; never exceeds the configured ceiling
    pub rewrites: u32,
}

impl WorkflowState {
    pub fn new(question: &str) -> Self {
        let mut state = Self {
            original_question: question.to_string(),
            current_query: question.to_string(),
            relevant_chunks: Vec::new(),
            seen_ids: HashSet::new(),
            used_queries: HashSet::new(),
            rewrites: 0,
        };
        state.used_queries.insert(normalize_query(question));
        state
    }

    /// Has this query (ignoring case and surrounding whitespace) already been
    /// issued in this execution?
    pub fn was_used(&self, query: &str) -> bool {
        self.used_queries.contains(&normalize_query(query))
    }

    /// Switch to a rewritten query, counting the cycle
    pub fn apply_rewrite(&mut self, query: String) {
        self.used_queries.insert(normalize_query(&query));
        self.current_query = query;
        self.rewrites += 1;
    }

    /// Union graded-relevant chunks into the accumulated set, keeping
    /// first-seen order and dropping duplicates by chunk identity
    pub fn accumulate(&mut self, chunks: Vec<RetrievedChunk>) {
        for chunk in chunks {
            if self.seen_ids.insert(chunk.id.clone()) {
                self.relevant_chunks.push(chunk);
            }
        }
    }
}

fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Outcome of the DECIDING stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Enough relevant evidence; proceed to translation and synthesis
    Proceed,
    /// Not enough evidence and rewrites remain; reformulate and retrieve again
    Rewrite,
    /// Ceiling reached with insufficient evidence; apply the strictness policy
    Exhausted,
}

/// The sufficiency branch, kept pure so the ceiling invariant is provable
pub fn decide(relevant_count: usize, rewrites: u32, config: &WorkflowConfig) -> Decision {
    if relevant_count >= config.min_relevant_chunks {
        Decision::Proceed
    } else if rewrites < config.max_rewrites {
        Decision::Rewrite
    } else {
        Decision::Exhausted
    }
}

/// Terminal value of one workflow execution
#[derive(Debug, Clone, Serialize)]
pub struct FinalResponse {
    /// Synthesized plain-English answer
    pub answer: String,

    /// Technical terms found in the evidence, with plain-language analogies
    pub jargon: JargonMap,

    /// The relevant chunks the answer was grounded in, in accumulation order
    pub sources: Vec<RetrievedChunk>,
}

/// Answer returned when the ceiling is exhausted with no relevant evidence
/// and strict mode is off
pub const INSUFFICIENT_EVIDENCE_ANSWER: &str = "I'm sorry, I couldn't find enough relevant \
     information in the SEC filings to answer your question accurately.";
