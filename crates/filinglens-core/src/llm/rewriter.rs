//! HTTP-based query rewriter using external LLM service

use super::{ChatMessage, LLMClient, QueryRewriter, RewriteRequest};
use crate::config::LLMServiceConfig;
use crate::error::{FilingLensError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Query rewriter using external HTTP LLM service
pub struct HttpQueryRewriter {
    client: Arc<dyn LLMClient>,
}

impl HttpQueryRewriter {
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
impl QueryRewriter for HttpQueryRewriter {
    async fn rewrite(&self, request: &RewriteRequest<'_>) -> Result<String> {
        let messages = vec![
            ChatMessage::system(
                "You are an AI generating an improved question optimized for vector \
                 database retrieval over SEC filings. Reason about the underlying \
                 semantic intent and keywords of the input question. Respond with the \
                 improved query only, on a single line, with no explanation.",
            ),
            ChatMessage::user(build_rewrite_prompt(request)),
        ];

        let response = self.client.chat_completion(messages).await?;

        let query = normalize_rewrite(&response);
        if query.is_empty() {
            return Err(FilingLensError::Llm(
                "rewriter returned an empty query".to_string(),
            ));
        }

        Ok(query)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

fn build_rewrite_prompt(request: &RewriteRequest<'_>) -> String {
    format!(
        "Original question: {}\n\
         Query used for the last retrieval: {}\n\
         Relevant excerpts found so far: {}\n\
         Rewrite attempt: {}\n\n\
         The last retrieval did not surface enough relevant filing excerpts. \
         Formulate an improved, highly-searchable query.",
        request.original_question, request.current_query, request.relevant_found, request.attempt
    )
}

/// Reduce the completion to a single bare query line
///
/// Models wrap rewrites in code fences, quotes, or label prefixes; the
/// retriever wants none of that.
fn normalize_rewrite(response: &str) -> String {
    let line = response
        .lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");

    let line = line
        .trim_start_matches("Query:")
        .trim_start_matches("query:")
        .trim();

    line.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}
