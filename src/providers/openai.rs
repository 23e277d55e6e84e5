//! OpenAI-compatible backend adapter.
//!
//! Chat completions via `gpt-4o-mini` and embeddings via
//! `text-embedding-3-small` by default; both overridable.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::providers::retry::{retry_with_backoff, BASE_DELAY, MAX_ATTEMPTS};
use crate::providers::ProviderConfig;
use crate::traits::provider::AiProvider;
use crate::types::provider::{AiRequest, AiResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4096;

// Per-million-token rates for gpt-4o-mini.
const INPUT_COST_PER_MTOK: f64 = 0.15;
const OUTPUT_COST_PER_MTOK: f64 = 0.60;

/// Adapter for OpenAI and API-compatible backends.
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    embedding_model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            client,
            config,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url,
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Deterministic cost from the rate table; no API round-trip.
    pub fn calculate_cost(input_tokens: u32, output_tokens: u32) -> f64 {
        let input = (input_tokens as f64 / 1_000_000.0) * INPUT_COST_PER_MTOK;
        let output = (output_tokens as f64 / 1_000_000.0) * OUTPUT_COST_PER_MTOK;
        input + output
    }

    async fn send_chat(&self, body: &ChatCompletionRequest<'_>) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("OpenAI API error {status}: {text}")));
        }

        Ok(response.json().await?)
    }

    async fn send_embedding(&self, body: &EmbeddingRequest<'_>) -> Result<EmbeddingResponse> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "OpenAI embedding error {status}: {text}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn query(&self, request: &AiRequest) -> Result<AiResponse> {
        let body = ChatCompletionRequest {
            model: self.model(),
            messages: &request.messages,
            temperature: request
                .temperature
                .or(self.config.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: request
                .max_tokens
                .or(self.config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let started = Instant::now();
        let completion =
            retry_with_backoff(|| self.send_chat(&body), MAX_ATTEMPTS, BASE_DELAY).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = completion.usage.unwrap_or_default();
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(AiResponse {
            content,
            provider: self.name().to_string(),
            model: completion.model,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost: Self::calculate_cost(usage.prompt_tokens, usage.completion_tokens),
            latency_ms,
            responded_at: Utc::now(),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response =
            retry_with_backoff(|| self.send_embedding(&body), MAX_ATTEMPTS, BASE_DELAY).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Provider("no embedding in OpenAI response".into()))
    }
}

// Wire types

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [crate::types::provider::ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_follows_credential() {
        assert!(!OpenAiProvider::new(ProviderConfig::default()).is_available());
        assert!(OpenAiProvider::new(ProviderConfig::new("sk-test")).is_available());
    }

    #[test]
    fn cost_uses_rate_table() {
        // 1M input + 1M output tokens.
        let cost = OpenAiProvider::calculate_cost(1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
        assert_eq!(OpenAiProvider::calculate_cost(0, 0), 0.0);
    }

    #[test]
    fn builder_overrides_apply() {
        let provider = OpenAiProvider::new(
            ProviderConfig::new("sk-test")
                .with_model("gpt-4o")
                .with_base_url("https://proxy.internal/v1"),
        )
        .with_embedding_model("text-embedding-3-large");
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.base_url, "https://proxy.internal/v1");
        assert_eq!(provider.embedding_model, "text-embedding-3-large");
    }
}
