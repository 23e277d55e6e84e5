//! Google-compatible backend adapter (Generative Language API).
//!
//! The API does not report token usage the way OpenAI does, so counts
//! are approximated from character length (~4 chars/token).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::providers::retry::{retry_with_backoff, BASE_DELAY, MAX_ATTEMPTS};
use crate::providers::{estimate_tokens, ProviderConfig};
use crate::traits::provider::AiProvider;
use crate::types::provider::{AiRequest, AiResponse, ChatRole};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 8192;

// Per-million-token rates for the flash tier.
const INPUT_COST_PER_MTOK: f64 = 0.075;
const OUTPUT_COST_PER_MTOK: f64 = 0.30;

/// Adapter for Google's Generative Language API.
pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
    embedding_model: String,
    base_url: String,
}

impl GoogleProvider {
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

    /// Map chat messages to Gemini contents.
    ///
    /// Gemini has no system role at this endpoint; system turns are
    /// folded in as user turns, assistant turns become `model`.
    fn to_contents(request: &AiRequest) -> Vec<Content> {
        request
            .messages
            .iter()
            .map(|m| Content {
                role: match m.role {
                    ChatRole::Assistant => "model",
                    ChatRole::System | ChatRole::User => "user",
                },
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect()
    }

    async fn send_generate(&self, body: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model(),
            self.config.api_key
        );
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("Google API error {status}: {text}")));
        }

        Ok(response.json().await?)
    }

    async fn send_embedding(&self, body: &EmbedRequest) -> Result<EmbedResponse> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.embedding_model, self.config.api_key
        );
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "Google embedding error {status}: {text}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AiProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn is_available(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn query(&self, request: &AiRequest) -> Result<AiResponse> {
        let body = GenerateRequest {
            contents: Self::to_contents(request),
            generation_config: GenerationConfig {
                temperature: request
                    .temperature
                    .or(self.config.temperature)
                    .unwrap_or(DEFAULT_TEMPERATURE),
                max_output_tokens: request
                    .max_tokens
                    .or(self.config.max_tokens)
                    .unwrap_or(DEFAULT_MAX_TOKENS),
            },
        };

        let started = Instant::now();
        let generated =
            retry_with_backoff(|| self.send_generate(&body), MAX_ATTEMPTS, BASE_DELAY).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let content = generated
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        // Approximate token accounting from character length.
        let input_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        let input_tokens = (input_chars.div_ceil(4)) as u32;
        let output_tokens = estimate_tokens(&content);

        Ok(AiResponse {
            content,
            provider: self.name().to_string(),
            model: self.model().to_string(),
            input_tokens,
            output_tokens,
            cost: Self::calculate_cost(input_tokens, output_tokens),
            latency_ms,
            responded_at: Utc::now(),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                role: "user",
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response =
            retry_with_backoff(|| self.send_embedding(&body), MAX_ATTEMPTS, BASE_DELAY).await?;

        Ok(response.embedding.values)
    }
}

// Wire types

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
