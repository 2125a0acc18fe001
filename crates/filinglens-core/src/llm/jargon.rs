//! HTTP-based jargon translator using external LLM service
//!
//! Scans relevant filing excerpts for technical financial vocabulary and maps
//! each distinct term to a one-sentence plain-English analogy.

use super::{ChatMessage, JargonMap, JargonTranslator, LLMClient};
use crate::config::LLMServiceConfig;
use crate::error::Result;
use crate::retrieval::RetrievedChunk;
use async_trait::async_trait;
use std::sync::Arc;

/// Jargon translator using external HTTP LLM service
pub struct HttpJargonTranslator {
    client: Arc<dyn LLMClient>,
}

impl HttpJargonTranslator {
    /// Create from LLM client
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    /// Create from configuration
    pub fn from_config(config: LLMServiceConfig) -> Result<Self> {
        let client = super::VLLMClient::new(config)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let client = super::VLLMClient::from_env()?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl JargonTranslator for HttpJargonTranslator {
    async fn translate(&self, chunks: &[RetrievedChunk]) -> Result<JargonMap> {
        // No context, no terms. Never ask the model to invent vocabulary.
        if chunks.is_empty() {
            return Ok(JargonMap::new());
        }

        let messages = vec![
            ChatMessage::system(
                "You are an expert financial advisor talking to a complete beginner. \
                 Identify any highly technical financial, accounting, or SEC-specific \
                 terms in the text (e.g., Amortization, EBITDA, Derivatives). Generate \
                 a very simple, one-sentence plain-English analogy or definition for \
                 each technical term. Produce the output strictly as a JSON dictionary \
                 mapping the term to its simplified definition. Example: \
                 {\"Amortization\": \"A way of spreading out a big expense over time, \
                 like paying off a car loan in monthly chunks.\"}",
            ),
            ChatMessage::user(build_jargon_prompt(chunks)),
        ];

        let response = self.client.chat_completion(messages).await?;

        Ok(parse_jargon_response(&response))
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_jargon_prompt(chunks: &[RetrievedChunk]) -> String {
    let text = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Excerpts:\n\n{}", text)
}

/// Parse the JSON dictionary, degrading to an empty mapping on malformed
/// output
///
/// A missing glossary is cosmetic; the synthesis stage still runs. Transport
/// failures are handled upstream and stay fatal.
fn parse_jargon_response(response: &str) -> JargonMap {
    let json_str = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            tracing::warn!("No JSON dictionary in jargon response, returning empty mapping");
            return JargonMap::new();
        }
    };

    let parsed: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to parse jargon dictionary: {}, returning empty mapping", e);
            tracing::debug!("Raw LLM response: {}", response);
            return JargonMap::new();
        }
    };

    let mut map = JargonMap::new();
    if let Some(object) = parsed.as_object() {
        for (term, analogy) in object {
            if let Some(analogy) = analogy.as_str() {
                if !term.trim().is_empty() && !analogy.trim().is_empty() {
                    map.insert(term.trim(), analogy.trim());
                }
            }
        }
    }

    tracing::debug!("Found {} jargon terms to simplify", map.len());
    map
}
