//! Test doubles for provider-facing code.
//!
//! `MockProvider` records every call behind an `Arc`, so a clone handed
//! to a factory shares its counters with the copy a test keeps. Scripted
//! behavior covers the cases the rest of the crate cares about: a canned
//! chat response, per-text embeddings, unavailability, and hard failure.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::providers::{estimate_tokens, ProviderFactory, ProviderId};
use crate::traits::provider::AiProvider;
use crate::types::provider::{AiRequest, AiResponse};

#[derive(Default)]
struct MockState {
    response: Option<String>,
    embeddings: HashMap<String, Vec<f32>>,
    default_embedding: Option<Vec<f32>>,
    query_prompts: Vec<String>,
    embed_texts: Vec<String>,
}

/// Scriptable [`AiProvider`] for tests. Clones share state.
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    available: bool,
    failing: bool,
    state: Arc<RwLock<MockState>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            failing: false,
            state: Arc::new(RwLock::new(MockState::default())),
        }
    }

    /// Reports `is_available() == false`; any call is a test bug.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Every `query` and `embed` call returns an error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Fixed content returned from every `query` call.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.write().response = Some(content.into());
        self
    }

    /// Embedding returned when `embed` is called with exactly `text`.
    pub fn with_embedding(self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.write().embeddings.insert(text.into(), embedding);
        self
    }

    /// Embedding returned for any text without a scripted match.
    pub fn with_default_embedding(self, embedding: Vec<f32>) -> Self {
        self.write().default_embedding = Some(embedding);
        self
    }

    pub fn query_calls(&self) -> usize {
        self.read().query_prompts.len()
    }

    /// User-message contents of every `query` call, in order.
    pub fn query_prompts(&self) -> Vec<String> {
        self.read().query_prompts.clone()
    }

    pub fn embed_calls(&self) -> usize {
        self.read().embed_texts.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn query(&self, request: &AiRequest) -> Result<AiResponse> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.write().query_prompts.push(prompt);

        if self.failing {
            return Err(Error::Provider(format!("{} mock failure", self.name)));
        }

        let content = self
            .read()
            .response
            .clone()
            .unwrap_or_else(|| "mock response".to_string());

        Ok(AiResponse {
            provider: self.name.clone(),
            model: "mock-model".to_string(),
            input_tokens: request
                .messages
                .iter()
                .map(|m| estimate_tokens(&m.content))
                .sum(),
            output_tokens: estimate_tokens(&content),
            cost: 0.0,
            latency_ms: 0,
            responded_at: Utc::now(),
            content,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.write().embed_texts.push(text.to_string());

        if self.failing {
            return Err(Error::Provider(format!("{} mock failure", self.name)));
        }

        let state = self.read();
        state
            .embeddings
            .get(text)
            .or(state.default_embedding.as_ref())
            .cloned()
            .ok_or_else(|| {
                Error::Provider(format!("{}: no embedding scripted for {text:?}", self.name))
            })
    }
}

/// [`ProviderFactory`] backed by a fixed map of mocks. Ids without an
/// entry resolve to an unavailable provider, matching how a registry
/// behaves for a provider with no credentials.
#[derive(Clone, Default)]
pub struct MockFactory {
    providers: HashMap<ProviderId, MockProvider>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, id: ProviderId, provider: MockProvider) -> Self {
        self.providers.insert(id, provider);
        self
    }
}

impl ProviderFactory for MockFactory {
    fn create(&self, id: ProviderId) -> Box<dyn AiProvider> {
        match self.providers.get(&id) {
            Some(provider) => Box::new(provider.clone()),
            None => Box::new(MockProvider::new(id.as_str()).unavailable()),
        }
    }
}
