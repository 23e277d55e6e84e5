//! Provider gateway: adapters over heterogeneous AI backends.
//!
//! A [`ProviderRegistry`] holds explicit per-backend configuration and
//! acts as the factory resolving a [`ProviderId`] to an adapter. There
//! are no process-wide singletons: callers construct a registry (usually
//! via [`ProviderRegistry::from_env`]) and pass it in.

pub mod google;
pub mod openai;
pub mod retry;

pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use retry::retry_with_backoff;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::traits::provider::AiProvider;

/// Closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAi,
    Google,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::OpenAi, ProviderId::Google];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Google => "google",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderId::OpenAi),
            "google" => Ok(ProviderId::Google),
            other => Err(Error::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// Per-backend configuration.
///
/// An empty `api_key` makes the adapter report itself unavailable;
/// construction never fails.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Chat model override; each adapter has its own default.
    pub model: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Transport-level request timeout.
    pub timeout: Duration,

    /// API base URL override (proxies, compatible backends).
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: None,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(30),
            base_url: None,
        }
    }
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read the API key from the given environment variable; absent or
    /// empty means the provider will be unavailable.
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).unwrap_or_default())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Resolves a [`ProviderId`] to an adapter instance.
///
/// The scoring engine and claim extractor create adapters on demand
/// through this seam, which keeps them testable with mock backends.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, id: ProviderId) -> Box<dyn AiProvider>;

    /// Ids whose adapters currently report themselves available.
    fn available(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.create(*id).is_available())
            .collect()
    }
}

/// Production factory holding one config per backend.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    openai: ProviderConfig,
    google: ProviderConfig,
}

impl ProviderRegistry {
    pub fn new(openai: ProviderConfig, google: ProviderConfig) -> Self {
        Self { openai, google }
    }

    /// Credentials from `OPENAI_API_KEY` / `GOOGLE_API_KEY`. Loading a
    /// dotenv file beforehand is the caller's concern.
    pub fn from_env() -> Self {
        Self {
            openai: ProviderConfig::from_env("OPENAI_API_KEY"),
            google: ProviderConfig::from_env("GOOGLE_API_KEY"),
        }
    }
}

impl ProviderFactory for ProviderRegistry {
    fn create(&self, id: ProviderId) -> Box<dyn AiProvider> {
        match id {
            ProviderId::OpenAi => Box::new(OpenAiProvider::new(self.openai.clone())),
            ProviderId::Google => Box::new(GoogleProvider::new(self.google.clone())),
        }
    }
}

/// Rough token estimate used where a backend reports no counts:
/// ~4 characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len().div_ceil(4)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_round_trips() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
        assert!("claude".parse::<ProviderId>().is_err());
    }

    #[test]
    fn registry_respects_credentials() {
        let registry = ProviderRegistry::new(
            ProviderConfig::new("sk-test"),
            ProviderConfig::default(),
        );
        assert!(registry.create(ProviderId::OpenAi).is_available());
        assert!(!registry.create(ProviderId::Google).is_available());
        assert_eq!(registry.available(), vec![ProviderId::OpenAi]);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
