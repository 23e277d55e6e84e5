//! Storage traits the orchestrator persists through.
//!
//! The storage layer is split into focused traits:
//! - `SiteStore`: site lookup and last-run bookkeeping
//! - `QueryStore`: priority-ordered query loading
//! - `RunStore`: runs and per-cell results
//! - `AnalysisStore`: composite trait combining all three
//!
//! The core hands these traits domain values and expects the backend to
//! durably persist them; it never sees a storage schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::query::{Query, Site};
use crate::types::run::{ResultRecord, Run};

/// Site lookup.
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get_site(&self, id: Uuid) -> Result<Option<Site>>;

    /// Stamp the site's last completed analysis run.
    async fn touch_site_last_run(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Query loading.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Up to `limit` enabled queries for the site, descending priority.
    ///
    /// The ordering is a contract: re-running an identical configuration
    /// must visit cells in the same sequence.
    async fn queries_by_priority(&self, site_id: Uuid, limit: usize) -> Result<Vec<Query>>;
}

/// Runs and their results.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &Run) -> Result<()>;

    /// Persist the current in-memory run state (status, progress, stamps).
    async fn update_run(&self, run: &Run) -> Result<()>;

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>>;

    /// Persist one cell result.
    ///
    /// Writes must be atomic per (run, query, provider) key: at most one
    /// result may exist per cell.
    async fn insert_result(&self, result: &ResultRecord) -> Result<()>;

    async fn results_for_run(&self, run_id: Uuid) -> Result<Vec<ResultRecord>>;
}

/// Composite storage trait used by the run orchestrator.
pub trait AnalysisStore: SiteStore + QueryStore + RunStore {}

// Blanket implementation: anything implementing all three is an AnalysisStore
impl<T: SiteStore + QueryStore + RunStore> AnalysisStore for T {}
