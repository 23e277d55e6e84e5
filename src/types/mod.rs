//! Domain data types for the evaluation core.
//!
//! These are plain serde-derived records. The core produces and consumes
//! them; durable persistence is the caller's concern.

pub mod claim;
pub mod provider;
pub mod query;
pub mod run;
pub mod score;

pub use claim::{ClaimSource, ExtractedClaim, PageMeta, PageMetadata};
pub use provider::{AiRequest, AiResponse, ChatMessage, ChatRole};
pub use query::{Difficulty, ExpectedAnswer, Query, QueryType, Site};
pub use run::{ResultRecord, Run, RunConfig, RunResults, RunStatus, SummaryScores};
pub use score::{
    AccuracyDetails, AccuracyScore, AttributionDetails, AttributionEvidence, AttributionScore,
    CompletenessDetails, CompletenessScore, EvidenceKind, ScoreBreakdown,
};
