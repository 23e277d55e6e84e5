//! AI provider trait for the gateway.
//!
//! Implementations wrap a specific backend (OpenAI-compatible,
//! Google-compatible) and handle its wire format, retry policy, and
//! cost accounting.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::provider::{AiRequest, AiResponse};

/// Uniform query/embedding contract over heterogeneous AI backends.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable provider identifier (`openai`, `google`).
    fn name(&self) -> &str;

    /// True iff a credential is configured.
    ///
    /// Never errors: missing credentials are a normal, non-exceptional
    /// outcome. Callers must check this before `query`/`embed` and skip
    /// unavailable providers rather than crash.
    fn is_available(&self) -> bool;

    /// Send a chat request and return the completed response.
    ///
    /// Wrapped in bounded retry internally (3 attempts, exponential
    /// backoff from 1s); the last error surfaces if all attempts fail.
    async fn query(&self, request: &AiRequest) -> Result<AiResponse>;

    /// Generate an embedding vector for the text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
