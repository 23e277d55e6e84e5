//! Score breakdown produced by the response analyzer.
//!
//! Three independent sub-scores, each 0-100 with a details record kept
//! for diagnostics. Computed once per (run, query, provider) cell and
//! never mutated.

use serde::{Deserialize, Serialize};

/// Complete scoring of one AI answer against its expected answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub accuracy: AccuracyScore,
    pub completeness: CompletenessScore,
    pub attribution: AttributionScore,
}

/// Semantic accuracy: does the answer agree with the key claims?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyScore {
    pub score: u8,
    pub details: AccuracyDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyDetails {
    /// Claims whose embedding similarity to the answer exceeded 0.70.
    pub accurate_claims: usize,
    pub total_claims: usize,
    /// Mean similarity across all claims, rounded to two decimals.
    pub avg_similarity: f32,
}

/// Coverage: how many key claims and keywords does the answer mention?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessScore {
    pub score: u8,
    pub details: CompletenessDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessDetails {
    pub mentioned_claims: usize,
    pub required_claims: usize,
    /// Truncated to 5 entries for readability; truncation never affects
    /// the score.
    pub missing_claims: Vec<String>,
}

/// Attribution: does the answer credit the source site?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionScore {
    pub score: u8,
    pub details: AttributionDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionDetails {
    pub has_direct_url: bool,
    pub has_domain_mention: bool,
    pub has_brand_mention: bool,
    pub evidence: Vec<AttributionEvidence>,
}

/// One attribution signal that fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionEvidence {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub value: String,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Url,
    Domain,
    Brand,
}
