//! Core trait abstractions.
//!
//! - [`provider`] - the AI backend capability seam
//! - [`store`] - storage seams the orchestrator persists through

pub mod provider;
pub mod store;

pub use provider::AiProvider;
pub use store::{AnalysisStore, QueryStore, RunStore, SiteStore};
