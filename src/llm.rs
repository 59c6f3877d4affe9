use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Returned by the generation endpoint when it answers successfully but
/// produces no usable text.
pub const NO_TEXT_RETURNED: &str = "[no text returned]";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("generation request failed: {0}")]
    Generation(String),
}

/// Produces an embedding vector for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Array1<f32>, LlmError>;
}

/// Produces an answer for a prompt, optionally grounded in context text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, LlmError>;
}

/// HTTP client for the remote inference endpoint. One client serves both
/// the embedding model and the text model.
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    embed_model: String,
    text_model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl InferenceClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.inference_url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            text_model: config.text_model.clone(),
        })
    }

    fn construct_prompt(prompt: &str, context: &str) -> String {
        if context.is_empty() {
            prompt.to_string()
        } else {
            format!(
                "Use the following context to answer the question.\n\n{context}\n\nQuestion: {prompt}"
            )
        }
    }
}

#[async_trait]
impl Embedder for InferenceClient {
    async fn embed(&self, text: &str) -> Result<Array1<f32>, LlmError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Embedding(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Embedding(e.to_string()))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Embedding(format!("malformed response: {e}")))?;

        match parsed.embedding {
            Some(vector) if !vector.is_empty() => Ok(Array1::from(vector)),
            _ => Err(LlmError::Embedding(
                "malformed response: missing or empty embedding vector".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Generator for InferenceClient {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let full_prompt = Self::construct_prompt(prompt, context);
        let body = GenerateRequest {
            model: &self.text_model,
            prompt: &full_prompt,
            stream: false,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Generation(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Generation(format!("malformed response: {e}")))?;

        match parsed.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Ok(NO_TEXT_RETURNED.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_context_is_passed_through() {
        let prompt = InferenceClient::construct_prompt("what were Q3 sales?", "");
        assert_eq!(prompt, "what were Q3 sales?");
    }

    #[test]
    fn prompt_with_context_places_context_first() {
        let prompt = InferenceClient::construct_prompt("what were Q3 sales?", "rows 1-3\n...");
        let ctx_pos = prompt.find("rows 1-3").unwrap();
        let q_pos = prompt.find("Question: what were Q3 sales?").unwrap();
        assert!(ctx_pos < q_pos);
    }
}
