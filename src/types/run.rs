//! Runs and their persisted results.
//!
//! A run is the top-level state machine record: one execution of a
//! query x provider matrix for a site. Lifecycle is
//! `Pending -> Running -> {Completed | Failed}`; terminal states are
//! terminal, re-analysis always creates a new run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::ProviderId;
use crate::types::provider::AiResponse;
use crate::types::score::ScoreBreakdown;

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Configuration captured when a run is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub providers: Vec<ProviderId>,
    pub query_count: usize,
    pub temperature: Option<f32>,
    pub max_retries: Option<u32>,
}

/// Rounded mean of each sub-score across all persisted results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryScores {
    pub accuracy: u8,
    pub completeness: u8,
    pub attribution: u8,
}

/// One analysis run over a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub site_id: Uuid,
    pub config: RunConfig,
    pub status: RunStatus,

    /// Number of cells in the execution matrix: |queries| x |providers|.
    pub total: u32,

    /// Cells attempted so far. Monotone, never exceeds `total`; every
    /// increment is exactly one attempted cell, whether or not a result
    /// row was written.
    pub progress: u32,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Message of the fatal error, set when status is `Failed`.
    pub error: Option<String>,

    /// `None` until completion, and `None` for completed runs that
    /// persisted zero results (e.g. no provider was available).
    pub summary_scores: Option<SummaryScores>,
}

impl Run {
    pub fn new(site_id: Uuid, config: RunConfig, total: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            config,
            status: RunStatus::Pending,
            total,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            summary_scores: None,
        }
    }

    /// Transition `Pending -> Running`, stamping the start time.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Count one attempted cell. Saturates at `total`.
    pub fn record_attempt(&mut self) {
        if self.progress < self.total {
            self.progress += 1;
        }
    }

    /// Transition to `Completed`, stamping the end time.
    pub fn complete(&mut self, summary: Option<SummaryScores>) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.summary_scores = summary;
    }

    /// Transition to `Failed`, recording the causing error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(message.into());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }
}

/// The persisted union of one provider response and one score breakdown,
/// keyed by (run, query, provider). At most one exists per key; a failed
/// attempt produces none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub run_id: Uuid,
    pub query_id: Uuid,
    pub provider: String,
    pub model: String,
    pub response: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub latency_ms: u64,
    pub accuracy_score: u8,
    pub completeness_score: u8,
    pub attribution_score: u8,

    /// Full per-dimension details, kept for diagnostics.
    pub feedback: ScoreBreakdown,

    pub responded_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn from_parts(
        run_id: Uuid,
        query_id: Uuid,
        response: &AiResponse,
        scores: &ScoreBreakdown,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            query_id,
            provider: response.provider.clone(),
            model: response.model.clone(),
            response: response.content.clone(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost: response.cost,
            latency_ms: response.latency_ms,
            accuracy_score: scores.accuracy.score,
            completeness_score: scores.completeness.score,
            attribution_score: scores.attribution.score,
            feedback: scores.clone(),
            responded_at: response.responded_at,
        }
    }
}

/// A run together with its results, worst accuracy first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub run: Run,
    pub results: Vec<ResultRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_run(total: u32) -> Run {
        Run::new(
            Uuid::new_v4(),
            RunConfig {
                providers: vec![ProviderId::OpenAi],
                query_count: total as usize,
                temperature: Some(0.7),
                max_retries: Some(3),
            },
            total,
        )
    }

    #[test]
    fn lifecycle_stamps_times() {
        let mut run = test_run(2);
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.started_at.is_none());

        run.start();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.started_at.is_some());
        assert!(!run.is_terminal());

        run.complete(None);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());
        assert!(run.is_terminal());
    }

    #[test]
    fn failure_records_message() {
        let mut run = test_run(1);
        run.start();
        run.fail("query set could not be loaded");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("query set could not be loaded"));
        assert!(run.is_terminal());
    }

    #[test]
    fn progress_never_exceeds_total() {
        let mut run = test_run(2);
        for _ in 0..5 {
            run.record_attempt();
        }
        assert_eq!(run.progress, 2);
    }
}
