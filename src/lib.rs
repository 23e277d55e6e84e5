//! EchoLens: measure how faithfully AI assistants answer questions
//! about a site.
//!
//! The pipeline runs curated queries against multiple AI providers,
//! scores each answer for accuracy, completeness, and attribution, and
//! persists per-cell results plus a run summary.
//!
//! The moving parts:
//! - [`providers`]: provider adapters (OpenAI, Google) behind the
//!   [`traits::provider::AiProvider`] trait, with retry and a factory
//! - [`limiter`]: per-provider sliding-window rate limiting
//! - [`scoring`]: the three-dimension response analyzer
//! - [`claims`]: tiered claim extraction from free text and structured
//!   page data
//! - [`runner`]: the run orchestrator driving the query x provider
//!   matrix
//! - [`stores`]: storage backends behind [`traits::store::AnalysisStore`]

pub mod claims;
pub mod error;
pub mod limiter;
pub mod providers;
pub mod runner;
pub mod scoring;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

pub use claims::ClaimExtractor;
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use providers::{ProviderConfig, ProviderFactory, ProviderId, ProviderRegistry};
pub use runner::AnalysisRunner;
pub use scoring::ResponseAnalyzer;
pub use stores::MemoryStore;
pub use traits::provider::AiProvider;
pub use traits::store::AnalysisStore;
