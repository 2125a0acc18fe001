//! HTTP-based answer synthesizer using external LLM service

use super::{ChatMessage, JargonMap, LLMClient, Synthesizer};
use crate::config::LLMServiceConfig;
use crate::error::{FilingLensError, Result};
use crate::retrieval::RetrievedChunk;
use async_trait::async_trait;
use std::sync::Arc;

/// Synthesizer using external HTTP LLM service
pub struct HttpSynthesizer {
    client: Arc<dyn LLMClient>,
}

impl HttpSynthesizer {
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
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        jargon: &JargonMap,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::system(build_synthesis_system_prompt(jargon)),
            ChatMessage::user(build_synthesis_prompt(question, chunks)),
        ];

        let response = self.client.chat_completion(messages).await?;

        let answer = response.trim().to_string();
        if answer.is_empty() {
            return Err(FilingLensError::Llm(
                "synthesizer returned an empty answer".to_string(),
            ));
        }

        Ok(answer)
    }

    fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

/// Grounding contract: the answer must come from the supplied context only.
/// This cannot be verified mechanically, so it is enforced here through the
/// instruction framing.
fn build_synthesis_system_prompt(jargon: &JargonMap) -> String {
    let mut prompt = String::from(
        "You are a helpful, beginner-friendly financial assistant analyzing SEC \
         filings. Answer the user's question using ONLY the provided excerpt \
         context. If the answer is not in the context, say you don't know; never \
         add claims the context does not support.\n",
    );

    if !jargon.is_empty() {
        prompt.push_str(
            "\nComplex terms found in the context, with their simplified meanings:\n",
        );
        for entry in jargon.iter() {
            prompt.push_str(&format!("- {}: {}\n", entry.term, entry.analogy));
        }
    }

    prompt.push_str(
        "\nUse simple, plain English. If you must use a technical term, include \
         its simplified meaning inline. Keep your tone encouraging and accessible.",
    );

    prompt
}

fn build_synthesis_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| format!("[{}]\n{}", c.source.label(), c.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!("Context:\n{}\n\nQuestion: {}", context, question)
}
