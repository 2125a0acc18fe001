//! HTTP-based relevance grader using external LLM service

use super::{ChatMessage, LLMClient, RelevanceGrader, RelevanceVerdict};
use crate::config::LLMServiceConfig;
use crate::error::{FilingLensError, Result};
use crate::retrieval::RetrievedChunk;
use async_trait::async_trait;
use std::sync::Arc;

/// Relevance grader using external HTTP LLM service
pub struct HttpRelevanceGrader {
    client: Arc<dyn LLMClient>,
}

impl HttpRelevanceGrader {
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
impl RelevanceGrader for HttpRelevanceGrader {
    async fn grade(&self, query: &str, chunk: &RetrievedChunk) -> Result<RelevanceVerdict> {
        let messages = vec![
            ChatMessage::system(
                "You are a grader assessing the relevance of a retrieved filing excerpt \
                 to a user question. If the excerpt contains keywords or semantic meaning \
                 related to the question, grade it as relevant. This does not need to be \
                 a stringent test; the goal is to filter out entirely unrelated retrievals. \
                 Output ONLY JSON: {\"is_relevant\": true} or {\"is_relevant\": false}",
            ),
            ChatMessage::user(build_grading_prompt(query, chunk)),
        ];

        let response = self.client.chat_completion(messages).await?;

        parse_verdict_response(&response)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_grading_prompt(query: &str, chunk: &RetrievedChunk) -> String {
    format!(
        "Retrieved excerpt ({}):\n\n{}\n\nUser question: {}",
        chunk.source.label(),
        chunk.text,
        query
    )
}

/// Validate the classification output against the verdict schema
///
/// Anything that does not parse into a `RelevanceVerdict` is a
/// `GradingParse` error; the workflow absorbs it as "irrelevant".
fn parse_verdict_response(response: &str) -> Result<RelevanceVerdict> {
    let json_str = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(FilingLensError::GradingParse(format!(
                "no JSON object in response: {:?}",
                response.chars().take(80).collect::<String>()
            )))
        }
    };

    serde_json::from_str::<RelevanceVerdict>(json_str)
        .map_err(|e| FilingLensError::GradingParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_relevant() {
        let verdict = parse_verdict_response(r#"{"is_relevant": true}"#).unwrap();
        assert!(verdict.is_relevant);
    }

    #[test]
    fn test_parse_verdict_irrelevant() {
        let verdict = parse_verdict_response(r#"{"is_relevant": false}"#).unwrap();
        assert!(!verdict.is_relevant);
    }

    #[test]
    fn test_parse_verdict_with_surrounding_prose() {
        let response = "Sure, here is the verdict:\n```json\n{\"is_relevant\": true}\n```";
        let verdict = parse_verdict_response(response).unwrap();
        assert!(verdict.is_relevant);
    }

    #[test]
    fn test_parse_verdict_rejects_free_text() {
        let err = parse_verdict_response("The document looks relevant to me.").unwrap_err();
        assert!(matches!(err, FilingLensError::GradingParse(_)));
    }

    #[test]
    fn test_parse_verdict_rejects_wrong_schema() {
        let err = parse_verdict_response(r#"{"relevant": "yes"}"#).unwrap_err();
        assert!(matches!(err, FilingLensError::GradingParse(_)));
    }
}
