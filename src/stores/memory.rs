//! In-memory storage backend.
//!
//! `RwLock<HashMap>` per entity, suitable for tests and single-process
//! use. Locks are std (not tokio) and never held across an await.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::store::{QueryStore, RunStore, SiteStore};
use crate::types::query::{Query, Site};
use crate::types::run::{ResultRecord, Run};

/// Result rows are keyed by cell so a duplicate write is rejected
/// instead of silently stacking.
type CellKey = (Uuid, Uuid, String);

#[derive(Default)]
pub struct MemoryStore {
    sites: RwLock<HashMap<Uuid, Site>>,
    queries: RwLock<Vec<Query>>,
    runs: RwLock<HashMap<Uuid, Run>>,
    results: RwLock<HashMap<CellKey, ResultRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&self, site: Site) {
        self.write_sites().insert(site.id, site);
    }

    pub fn add_query(&self, query: Query) {
        self.write_queries().push(query);
    }

    fn write_sites(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Site>> {
        self.sites.write().unwrap_or_else(|e| e.into_inner())
    }

    fn write_queries(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Query>> {
        self.queries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn get_site(&self, id: Uuid) -> Result<Option<Site>> {
        let sites = self.sites.read().unwrap_or_else(|e| e.into_inner());
        Ok(sites.get(&id).cloned())
    }

    async fn touch_site_last_run(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut sites = self.write_sites();
        let site = sites
            .get_mut(&id)
            .ok_or_else(|| Error::Storage(format!("unknown site {id}")))?;
        site.last_run_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl QueryStore for MemoryStore {
    async fn queries_by_priority(&self, site_id: Uuid, limit: usize) -> Result<Vec<Query>> {
        let queries = self.queries.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<Query> = queries
            .iter()
            .filter(|q| q.site_id == site_id && q.enabled)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal priorities, so
        // repeat runs see an identical sequence.
        matching.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(|e| e.into_inner());
        if runs.contains_key(&run.id) {
            return Err(Error::Storage(format!("run {} already exists", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(|e| e.into_inner());
        if !runs.contains_key(&run.id) {
            return Err(Error::Storage(format!("unknown run {}", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<Run>> {
        let runs = self.runs.read().unwrap_or_else(|e| e.into_inner());
        Ok(runs.get(&id).cloned())
    }

    async fn insert_result(&self, result: &ResultRecord) -> Result<()> {
        let key = (result.run_id, result.query_id, result.provider.clone());
        let mut results = self.results.write().unwrap_or_else(|e| e.into_inner());
        if results.contains_key(&key) {
            return Err(Error::Storage(format!(
                "duplicate result for run {} query {} provider {}",
                result.run_id, result.query_id, result.provider
            )));
        }
        results.insert(key, result.clone());
        Ok(())
    }

    async fn results_for_run(&self, run_id: Uuid) -> Result<Vec<ResultRecord>> {
        let results = self.results.read().unwrap_or_else(|e| e.into_inner());
        Ok(results
            .values()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderId;
    use crate::types::query::Difficulty;
    use crate::types::run::RunConfig;
    use crate::types::score::{
        AccuracyDetails, AccuracyScore, AttributionDetails, AttributionScore,
        CompletenessDetails, CompletenessScore, ScoreBreakdown,
    };
    use crate::types::provider::AiResponse;

    fn sample_result(run_id: Uuid, query_id: Uuid, provider: &str) -> ResultRecord {
        let response = AiResponse {
            content: "answer".into(),
            provider: provider.into(),
            model: "m".into(),
            input_tokens: 1,
            output_tokens: 1,
            cost: 0.0,
            latency_ms: 5,
            responded_at: Utc::now(),
        };
        let breakdown = ScoreBreakdown {
            accuracy: AccuracyScore {
                score: 100,
                details: AccuracyDetails {
                    accurate_claims: 0,
                    total_claims: 0,
                    avg_similarity: 1.0,
                },
            },
            completeness: CompletenessScore {
                score: 100,
                details: CompletenessDetails {
                    mentioned_claims: 0,
                    required_claims: 0,
                    missing_claims: vec![],
                },
            },
            attribution: AttributionScore {
                score: 0,
                details: AttributionDetails {
                    has_direct_url: false,
                    has_domain_mention: false,
                    has_brand_mention: false,
                    evidence: vec![],
                },
            },
        };
        ResultRecord::from_parts(run_id, query_id, &response, &breakdown)
    }

    #[tokio::test]
    async fn queries_come_back_enabled_sorted_and_limited() {
        let store = MemoryStore::new();
        let site = Site::new("example.com");
        store.add_site(site.clone());

        let hard = Query::new(site.id, "hard", Difficulty::Hard);
        let easy = Query::new(site.id, "easy", Difficulty::Easy);
        let medium = Query::new(site.id, "medium", Difficulty::Medium);
        let mut disabled = Query::new(site.id, "disabled", Difficulty::Easy);
        disabled.enabled = false;
        let other_site = Query::new(Uuid::new_v4(), "elsewhere", Difficulty::Easy);

        for q in [hard, easy, medium, disabled, other_site] {
            store.add_query(q);
        }

        let all = store.queries_by_priority(site.id, 10).await.unwrap();
        let texts: Vec<&str> = all.iter().map(|q| q.canonical.as_str()).collect();
        assert_eq!(texts, vec!["easy", "medium", "hard"]);

        let limited = store.queries_by_priority(site.id, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].canonical, "easy");
    }

    #[tokio::test]
    async fn equal_priorities_keep_insertion_order() {
        let store = MemoryStore::new();
        let site_id = Uuid::new_v4();
        store.add_query(Query::new(site_id, "first", Difficulty::Medium));
        store.add_query(Query::new(site_id, "second", Difficulty::Medium));

        let queries = store.queries_by_priority(site_id, 10).await.unwrap();
        assert_eq!(queries[0].canonical, "first");
        assert_eq!(queries[1].canonical, "second");
    }

    #[tokio::test]
    async fn touch_site_updates_last_run() {
        let store = MemoryStore::new();
        let site = Site::new("example.com");
        store.add_site(site.clone());

        let at = Utc::now();
        store.touch_site_last_run(site.id, at).await.unwrap();

        let reloaded = store.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_run_at, Some(at));

        assert!(store.touch_site_last_run(Uuid::new_v4(), at).await.is_err());
    }

    #[tokio::test]
    async fn run_create_and_update_round_trip() {
        let store = MemoryStore::new();
        let config = RunConfig {
            providers: vec![ProviderId::OpenAi],
            query_count: 1,
            temperature: None,
            max_retries: None,
        };
        let mut run = Run::new(Uuid::new_v4(), config, 1);

        store.create_run(&run).await.unwrap();
        assert!(store.create_run(&run).await.is_err());

        run.start();
        store.update_run(&run).await.unwrap();
        let loaded = store.get_run(run.id).await.unwrap().unwrap();
        assert!(loaded.started_at.is_some());

        let unknown = Run::new(Uuid::new_v4(), loaded.config.clone(), 1);
        assert!(store.update_run(&unknown).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_cell_result_is_rejected() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();
        let query_id = Uuid::new_v4();

        store
            .insert_result(&sample_result(run_id, query_id, "openai"))
            .await
            .unwrap();
        // Same cell again fails; a different provider for the same query is fine.
        assert!(store
            .insert_result(&sample_result(run_id, query_id, "openai"))
            .await
            .is_err());
        store
            .insert_result(&sample_result(run_id, query_id, "google"))
            .await
            .unwrap();

        let results = store.results_for_run(run_id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(store
            .results_for_run(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}
