//! Chroma REST client
//!
//! Embeds the query locally via the configured embedding service, then runs a
//! nearest-neighbour query against the Chroma collection the ingestion
//! pipeline wrote to.

use super::{ChunkSource, RetrievedChunk, Retriever};
use crate::config::RetrieverConfig;
use crate::error::{FilingLensError, Result};
use crate::llm::Embedder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Retriever backed by a Chroma server
pub struct ChromaRetriever {
    http_client: reqwest::Client,
    config: RetrieverConfig,
    embedder: Arc<dyn Embedder>,
    /// Collection UUID, resolved from the configured name on first search
    collection_id: OnceCell<String>,
}

impl ChromaRetriever {
    /// Create from configuration and an embedder
    pub fn new(config: RetrieverConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FilingLensError::Http)?;

        Ok(Self {
            http_client,
            config,
            embedder,
            collection_id: OnceCell::new(),
        })
    }

    async fn resolve_collection_id(&self) -> Result<&String> {
        self.collection_id
            .get_or_try_init(|| async {
                let url = format!(
                    "{}/api/v1/collections/{}",
                    self.config.url, self.config.collection
                );

                let response = self.http_client.get(&url).send().await.map_err(|e| {
                    FilingLensError::RetrieverUnavailable(format!(
                        "failed to reach Chroma at {}: {}",
                        self.config.url, e
                    ))
                })?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(FilingLensError::RetrieverUnavailable(format!(
                        "collection '{}' lookup failed (HTTP {})",
                        self.config.collection, status
                    )));
                }

                let collection: CollectionInfo = response.json().await.map_err(|e| {
                    FilingLensError::RetrieverUnavailable(format!(
                        "malformed collection response: {}",
                        e
                    ))
                })?;

                Ok(collection.id)
            })
            .await
    }
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct QueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: Vec<&'static str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<ChunkSource>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        let collection_id = self.resolve_collection_id().await?;

        let request = QueryRequest {
            query_embeddings: vec![query_embedding],
            n_results: top_k,
            include: vec!["documents", "metadatas", "distances"],
        };

        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.config.url, collection_id
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                FilingLensError::RetrieverUnavailable(format!(
                    "failed to reach Chroma at {}: {}",
                    self.config.url, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FilingLensError::RetrieverUnavailable(format!(
                "query failed (HTTP {}): {}",
                status, body
            )));
        }

        let query_response: QueryResponse = response.json().await.map_err(|e| {
            FilingLensError::RetrieverUnavailable(format!("malformed query response: {}", e))
        })?;

        let chunks = parse_query_response(query_response);
        tracing::debug!("Retrieved {} chunks for query", chunks.len());

        Ok(chunks)
    }
}

/// Flatten Chroma's per-query nested arrays into scored chunks
///
/// One query embedding in, so only the first inner array of each field is
/// meaningful. Missing documents or metadata entries are tolerated; missing
/// distances default to zero similarity.
fn parse_query_response(response: QueryResponse) -> Vec<RetrievedChunk> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let mut documents = response
        .documents
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = response
        .metadatas
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();
    let mut distances = response
        .distances
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .filter_map(|id| {
            let text = documents.next().flatten();
            let source = metadatas.next().flatten().unwrap_or_default();
            let distance = distances.next();

            text.map(|text| RetrievedChunk {
                id,
                text,
                source,
                score: 1.0 - distance.unwrap_or(1.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_response() {
        let json = r#"{
            "ids": [["c1", "c2"]],
            "documents": [["Revenue was $394.3 billion.", "Risk factors include supply chain."]],
            "metadatas": [[
                {"Ticker": "AAPL", "Year": "2023", "Quarter": "FY", "Form_Type": "10-K"},
                null
            ]],
            "distances": [[0.15, 0.4]]
        }"#;

        let response: QueryResponse = serde_json::from_str(json).unwrap();
        let chunks = parse_query_response(response);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "c1");
        assert_eq!(chunks[0].source.ticker.as_deref(), Some("AAPL"));
        assert!((chunks[0].score - 0.85).abs() < 1e-6);
        assert_eq!(chunks[1].source, ChunkSource::default());
    }

    #[test]
    fn test_parse_query_response_skips_missing_documents() {
        let json = r#"{
            "ids": [["c1", "c2"]],
            "documents": [[null, "Only this chunk has text."]],
            "metadatas": [[null, null]],
            "distances": [[0.1, 0.2]]
        }"#;

        let response: QueryResponse = serde_json::from_str(json).unwrap();
        let chunks = parse_query_response(response);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "c2");
    }

    #[test]
    fn test_parse_query_response_empty() {
        let json = r#"{"ids": [], "documents": [], "metadatas": [], "distances": []}"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        assert!(parse_query_response(response).is_empty());
    }
}
