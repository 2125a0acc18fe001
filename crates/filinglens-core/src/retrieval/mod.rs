//! Retrieval against the vector store
//!
//! The ingestion pipeline (external to this crate) chunks filings and stores
//! them in Chroma with per-chunk source metadata. This module consumes that
//! store: given a query string, return scored candidate chunks.

mod chroma;

pub use chroma::ChromaRetriever;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Source metadata attached to each ingested chunk
///
/// Field names mirror the ingestion pipeline's filename convention:
/// `{ticker}_{year}_{quarter}_{form_type}.txt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSource {
    #[serde(default, rename = "Ticker")]
    pub ticker: Option<String>,

    #[serde(default, rename = "Year")]
    pub year: Option<String>,

    #[serde(default, rename = "Quarter")]
    pub quarter: Option<String>,

    #[serde(default, rename = "Form_Type")]
    pub form_type: Option<String>,

    /// Original document path within the ingestion data directory
    #[serde(default)]
    pub source: Option<String>,
}

impl ChunkSource {
    /// Human-readable citation label, e.g. "AAPL 10-K 2023"
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref ticker) = self.ticker {
            parts.push(ticker.clone());
        }
        if let Some(ref form_type) = self.form_type {
            parts.push(form_type.clone());
        }
        if let Some(ref year) = self.year {
            parts.push(year.clone());
        }
        if let Some(ref quarter) = self.quarter {
            if quarter != "FY" {
                parts.push(quarter.clone());
            }
        }
        if parts.is_empty() {
            self.source.clone().unwrap_or_else(|| "unknown".to_string())
        } else {
            parts.join(" ")
        }
    }
}

/// A contiguous span of filing text returned by retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Stable store-assigned identity, used for cross-round deduplication
    pub id: String,

    /// Chunk text
    pub text: String,

    /// Source metadata
    pub source: ChunkSource,

    /// Similarity score (1.0 = identical direction, higher is better)
    pub score: f32,
}

/// Vector retriever interface
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Search the store, returning up to `top_k` candidate chunks ordered by
    /// descending similarity
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_label_full() {
        let source = ChunkSource {
            ticker: Some("AAPL".to_string()),
            year: Some("2023".to_string()),
            quarter: Some("FY".to_string()),
            form_type: Some("10-K".to_string()),
            source: None,
        };
        assert_eq!(source.label(), "AAPL 10-K 2023");
    }

    #[test]
    fn test_source_label_quarterly() {
        let source = ChunkSource {
            ticker: Some("MSFT".to_string()),
            year: Some("2023".to_string()),
            quarter: Some("Q2".to_string()),
            form_type: Some("10-Q".to_string()),
            source: None,
        };
        assert_eq!(source.label(), "MSFT 10-Q 2023 Q2");
    }

    #[test]
    fn test_source_label_falls_back_to_path() {
        let source = ChunkSource {
            source: Some("data/unparsed.txt".to_string()),
            ..Default::default()
        };
        assert_eq!(source.label(), "data/unparsed.txt");
    }
}
