//! Run orchestrator: drives the query x provider execution matrix.
//!
//! A single logical thread of control walks queries in descending
//! priority order and providers in configured order. Each cell resolves
//! its provider, waits on that provider's rate limiter, queries, scores,
//! and persists a result. Cell failures are logged and counted, never
//! fatal; only errors escaping the outer loop fail the run.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::providers::{ProviderFactory, ProviderId};
use crate::scoring::ResponseAnalyzer;
use crate::traits::store::AnalysisStore;
use crate::types::query::{Query, Site};
use crate::types::run::{ResultRecord, Run, RunConfig, RunResults, SummaryScores};
use crate::types::provider::AiRequest;

/// Sampling defaults for evaluation queries.
const QUERY_TEMPERATURE: f32 = 0.7;
const QUERY_MAX_TOKENS: u32 = 2048;

/// Top-level orchestrator for analysis runs.
pub struct AnalysisRunner<S, F>
where
    S: AnalysisStore,
    F: ProviderFactory + Clone,
{
    store: S,
    factory: F,
    analyzer: ResponseAnalyzer<F>,
    requests_per_minute: usize,
    tokens_per_minute: u64,
}

impl<S, F> AnalysisRunner<S, F>
where
    S: AnalysisStore,
    F: ProviderFactory + Clone,
{
    pub fn new(store: S, factory: F) -> Self {
        let analyzer = ResponseAnalyzer::new(factory.clone());
        Self {
            store,
            factory,
            analyzer,
            requests_per_minute: 60,
            tokens_per_minute: 60_000,
        }
    }

    /// Override the per-provider rate-limit ceilings.
    pub fn with_rate_limits(mut self, requests_per_minute: usize, tokens_per_minute: u64) -> Self {
        self.requests_per_minute = requests_per_minute;
        self.tokens_per_minute = tokens_per_minute;
        self
    }

    /// Execute a full analysis run and return its id.
    ///
    /// Loads up to `query_count` enabled queries by descending priority,
    /// creates the run record, walks the matrix, and computes summary
    /// scores. A missing site or an empty query set errors before any
    /// run row exists; errors after that mark the run `Failed` with the
    /// message recorded, then re-raise.
    pub async fn run_analysis(
        &self,
        site_id: Uuid,
        providers: &[ProviderId],
        query_count: usize,
    ) -> Result<Uuid> {
        let site = self
            .store
            .get_site(site_id)
            .await?
            .ok_or(Error::SiteNotFound(site_id))?;

        let queries = self.store.queries_by_priority(site_id, query_count).await?;
        if queries.is_empty() {
            return Err(Error::NoQueries);
        }

        info!(
            site = %site.domain,
            queries = queries.len(),
            providers = ?providers,
            "starting analysis run"
        );

        let config = RunConfig {
            providers: providers.to_vec(),
            query_count: queries.len(),
            temperature: Some(QUERY_TEMPERATURE),
            max_retries: Some(3),
        };
        let total = (queries.len() * providers.len()) as u32;
        let mut run = Run::new(site_id, config, total);
        self.store.create_run(&run).await?;

        run.start();
        self.store.update_run(&run).await?;
        let run_id = run.id;

        match self.execute(&mut run, &site, &queries, providers).await {
            Ok(()) => {
                info!(run = %run_id, progress = run.progress, "analysis run complete");
                Ok(run_id)
            }
            Err(err) => {
                run.fail(err.to_string());
                if let Err(store_err) = self.store.update_run(&run).await {
                    warn!(run = %run_id, error = %store_err, "failed to persist failed run state");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut Run,
        site: &Site,
        queries: &[Query],
        providers: &[ProviderId],
    ) -> Result<()> {
        // One limiter per provider, owned by this run. With the matrix
        // driven sequentially each limiter only ever sees one caller.
        let limiters: HashMap<ProviderId, RateLimiter> = providers
            .iter()
            .map(|&id| {
                (
                    id,
                    RateLimiter::new(self.requests_per_minute, self.tokens_per_minute),
                )
            })
            .collect();

        for query in queries {
            for &provider_id in providers {
                if let Err(err) = self
                    .execute_cell(run.id, site, query, provider_id, &limiters)
                    .await
                {
                    // Partial-failure policy: the cell is counted as
                    // attempted, no result row is written.
                    warn!(
                        run = %run.id,
                        query = %query.canonical,
                        provider = %provider_id,
                        error = %err,
                        "cell failed"
                    );
                }
                run.record_attempt();
                self.store.update_run(run).await?;
            }
        }

        let results = self.store.results_for_run(run.id).await?;
        run.complete(summarize(&results));
        self.store.update_run(run).await?;
        self.store.touch_site_last_run(site.id, Utc::now()).await?;

        Ok(())
    }

    /// One (query, provider) cell. An unavailable provider is a normal
    /// skip, not an error.
    async fn execute_cell(
        &self,
        run_id: Uuid,
        site: &Site,
        query: &Query,
        provider_id: ProviderId,
        limiters: &HashMap<ProviderId, RateLimiter>,
    ) -> Result<()> {
        let provider = self.factory.create(provider_id);
        if !provider.is_available() {
            warn!(provider = %provider_id, "provider not available, skipping cell");
            return Ok(());
        }

        if let Some(limiter) = limiters.get(&provider_id) {
            limiter.admit_default().await;
        }

        let request = AiRequest::from_user(&query.canonical)
            .with_temperature(QUERY_TEMPERATURE)
            .with_max_tokens(QUERY_MAX_TOKENS);
        let response = provider.query(&request).await?;

        debug!(
            provider = %provider_id,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost = response.cost,
            latency_ms = response.latency_ms,
            "provider responded"
        );

        let scores = self
            .analyzer
            .analyze(
                &query.canonical,
                &query.expected_answer,
                &response.content,
                &site.domain,
            )
            .await?;

        let record = ResultRecord::from_parts(run_id, query.id, &response, &scores);
        self.store.insert_result(&record).await?;

        Ok(())
    }

    /// A run with its results, worst accuracy first so problems surface
    /// at the top.
    pub async fn get_run_results(&self, run_id: Uuid) -> Result<RunResults> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(Error::RunNotFound(run_id))?;

        let mut results = self.store.results_for_run(run_id).await?;
        results.sort_by_key(|r| r.accuracy_score);

        Ok(RunResults { run, results })
    }
}

/// Rounded arithmetic mean of each sub-score over the persisted results.
///
/// `None` when no results exist (all cells skipped or failed); the run
/// still completes, it just has no summary to report.
fn summarize(results: &[ResultRecord]) -> Option<SummaryScores> {
    if results.is_empty() {
        return None;
    }

    let n = results.len() as f64;
    let mean = |extract: fn(&ResultRecord) -> u8| -> u8 {
        (results.iter().map(|r| extract(r) as f64).sum::<f64>() / n).round() as u8
    };

    Some(SummaryScores {
        accuracy: mean(|r| r.accuracy_score),
        completeness: mean(|r| r.completeness_score),
        attribution: mean(|r| r.attribution_score),
    })
}
