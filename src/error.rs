//! Typed errors for the evaluation core.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;
use uuid::Uuid;

use crate::providers::ProviderId;

/// Errors that can occur during analysis operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration problem (missing or malformed settings).
    ///
    /// Missing credentials are normally surfaced as
    /// `AiProvider::is_available() == false` instead of this variant.
    #[error("config error: {0}")]
    Config(String),

    /// Provider API returned an error after retries were exhausted.
    #[error("provider error: {0}")]
    Provider(String),

    /// No credential configured for the provider, or every fallback
    /// provider was exhausted.
    #[error("provider not available: {0}")]
    ProviderUnavailable(ProviderId),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON, typically from an LLM response.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Site does not exist in the store.
    #[error("site not found: {0}")]
    SiteNotFound(Uuid),

    /// Run does not exist in the store.
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// The site has no enabled queries to execute.
    #[error("no queries found, run query generation first")]
    NoQueries,

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, Error>;
