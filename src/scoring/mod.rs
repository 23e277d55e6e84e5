//! Response analyzer: scores a free-text AI answer against an expected
//! answer on three independent dimensions.
//!
//! - **Accuracy** - embedding similarity between the answer and each key
//!   claim.
//! - **Completeness** - hybrid semantic + lexical claim coverage, plus
//!   keyword coverage.
//! - **Attribution** - purely lexical source-crediting signals (URL,
//!   domain, brand), no embeddings.
//!
//! Embeddings come from the OpenAI-compatible backend when available,
//! falling back to the Google-compatible one.

use tracing::warn;

use crate::error::{Error, Result};
use crate::providers::{ProviderFactory, ProviderId};
use crate::traits::provider::AiProvider;
use crate::types::query::ExpectedAnswer;
use crate::types::score::{
    AccuracyDetails, AccuracyScore, AttributionDetails, AttributionEvidence, AttributionScore,
    CompletenessDetails, CompletenessScore, EvidenceKind, ScoreBreakdown,
};

/// Similarity above which a claim counts as accurate.
const ACCURACY_THRESHOLD: f32 = 0.70;

/// Similarity above which a claim counts as mentioned (completeness).
const COMPLETENESS_THRESHOLD: f32 = 0.75;

/// Fraction of significant claim tokens that must appear lexically.
const LEXICAL_OVERLAP_THRESHOLD: f64 = 0.6;

/// Missing claims kept in the details record (diagnostic truncation,
/// never affects the score).
const MAX_MISSING_CLAIMS: usize = 5;

/// Stateless scorer; owns nothing but a provider factory for embeddings.
pub struct ResponseAnalyzer<F: ProviderFactory> {
    factory: F,
}

impl<F: ProviderFactory> ResponseAnalyzer<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Score one answer. `query_text` is carried for log context only;
    /// all scoring derives from the expected answer, the answer text,
    /// and the site domain.
    pub async fn analyze(
        &self,
        query_text: &str,
        expected: &ExpectedAnswer,
        answer: &str,
        site_domain: &str,
    ) -> Result<ScoreBreakdown> {
        // No key claims, nothing to embed.
        let similarities: Vec<f32> = if expected.key_claims.is_empty() {
            Vec::new()
        } else {
            let (answer_embedding, claim_embeddings) =
                self.embed_all(answer, &expected.key_claims).await?;
            claim_embeddings
                .iter()
                .map(|claim| cosine_similarity(&answer_embedding, claim))
                .collect()
        };

        let accuracy = score_accuracy(expected, &similarities);
        let completeness = score_completeness(expected, answer, &similarities);
        let attribution = score_attribution(answer, site_domain);

        tracing::debug!(
            query = query_text,
            accuracy = accuracy.score,
            completeness = completeness.score,
            attribution = attribution.score,
            "response scored"
        );

        Ok(ScoreBreakdown {
            accuracy,
            completeness,
            attribution,
        })
    }

    /// One embedding for the answer, one per key claim.
    ///
    /// Prefers OpenAI; uses Google when OpenAI lacks a credential, and
    /// falls back to Google when the OpenAI calls error mid-flight.
    async fn embed_all(&self, answer: &str, claims: &[String]) -> Result<(Vec<f32>, Vec<Vec<f32>>)> {
        let mut provider = self.factory.create(ProviderId::OpenAi);
        if !provider.is_available() {
            provider = self.factory.create(ProviderId::Google);
        }
        if !provider.is_available() {
            return Err(Error::ProviderUnavailable(ProviderId::Google));
        }

        match embed_with(provider.as_ref(), answer, claims).await {
            Ok(embeddings) => Ok(embeddings),
            Err(err) if provider.name() == "openai" => {
                warn!(error = %err, "OpenAI embeddings failed, falling back to Google");
                let fallback = self.factory.create(ProviderId::Google);
                if fallback.is_available() {
                    embed_with(fallback.as_ref(), answer, claims).await
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }
}

async fn embed_with(
    provider: &dyn AiProvider,
    answer: &str,
    claims: &[String],
) -> Result<(Vec<f32>, Vec<Vec<f32>>)> {
    let answer_embedding = provider.embed(answer).await?;
    let mut claim_embeddings = Vec::with_capacity(claims.len());
    for claim in claims {
        claim_embeddings.push(provider.embed(claim).await?);
    }
    Ok((answer_embedding, claim_embeddings))
}

fn score_accuracy(expected: &ExpectedAnswer, similarities: &[f32]) -> AccuracyScore {
    let total_claims = expected.key_claims.len();

    // No claims to contradict: vacuously accurate.
    if total_claims == 0 {
        return AccuracyScore {
            score: 100,
            details: AccuracyDetails {
                accurate_claims: 0,
                total_claims: 0,
                avg_similarity: 1.0,
            },
        };
    }

    let avg_similarity = similarities.iter().sum::<f32>() / similarities.len() as f32;
    let accurate_claims = similarities
        .iter()
        .filter(|&&sim| sim > ACCURACY_THRESHOLD)
        .count();

    let score = (accurate_claims as f32 / total_claims as f32) * 0.7 + avg_similarity * 0.3;

    AccuracyScore {
        score: to_percent(score),
        details: AccuracyDetails {
            accurate_claims,
            total_claims,
            avg_similarity: (avg_similarity * 100.0).round() / 100.0,
        },
    }
}

fn score_completeness(
    expected: &ExpectedAnswer,
    answer: &str,
    similarities: &[f32],
) -> CompletenessScore {
    let answer_lower = answer.to_lowercase();

    let mut mentioned = 0usize;
    let mut missing_claims = Vec::new();

    for (i, claim) in expected.key_claims.iter().enumerate() {
        let semantic_found = similarities
            .get(i)
            .is_some_and(|&sim| sim > COMPLETENESS_THRESHOLD);
        let lexical_found = claim_mentioned(claim, &answer_lower);

        if semantic_found || lexical_found {
            mentioned += 1;
        } else {
            missing_claims.push(claim.clone());
        }
    }

    let mentioned_keywords = expected
        .keywords
        .iter()
        .filter(|keyword| answer_lower.contains(&keyword.to_lowercase()))
        .count();

    // A ratio with nothing required is trivially satisfied.
    let claim_ratio = if expected.key_claims.is_empty() {
        1.0
    } else {
        mentioned as f64 / expected.key_claims.len() as f64
    };
    let keyword_ratio = if expected.keywords.is_empty() {
        1.0
    } else {
        mentioned_keywords as f64 / expected.keywords.len() as f64
    };

    let score = claim_ratio * 0.7 + keyword_ratio * 0.3;

    missing_claims.truncate(MAX_MISSING_CLAIMS);

    CompletenessScore {
        score: to_percent(score as f32),
        details: CompletenessDetails {
            mentioned_claims: mentioned,
            required_claims: expected.key_claims.len(),
            missing_claims,
        },
    }
}

/// Lexical heuristic: more than 60% of the claim's significant tokens
/// (longer than 3 chars) appear as substrings of the lowercased answer.
fn claim_mentioned(claim: &str, answer_lower: &str) -> bool {
    let words: Vec<String> = claim
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        return false;
    }

    let matched = words.iter().filter(|w| answer_lower.contains(w.as_str())).count();
    matched as f64 / words.len() as f64 > LEXICAL_OVERLAP_THRESHOLD
}

fn score_attribution(answer: &str, site_domain: &str) -> AttributionScore {
    let answer_lower = answer.to_lowercase();
    let domain_lower = site_domain.to_lowercase();

    let mut score = 0u32;
    let mut evidence = Vec::new();

    let has_direct_url = answer_lower.contains(&format!("https://{domain_lower}"))
        || answer_lower.contains(&format!("http://{domain_lower}"))
        || answer_lower.contains(&format!("www.{domain_lower}"));

    if has_direct_url {
        score += 60;
        evidence.push(AttributionEvidence {
            kind: EvidenceKind::Url,
            value: site_domain.to_string(),
            context: "Direct URL found in response".to_string(),
        });
    }

    let has_domain_mention = answer_lower.contains(&domain_lower);
    if has_domain_mention && !has_direct_url {
        score += 30;
        evidence.push(AttributionEvidence {
            kind: EvidenceKind::Domain,
            value: site_domain.to_string(),
            context: "Domain name mentioned".to_string(),
        });
    }

    // First label of the domain, guarded against short/common words.
    let brand = domain_lower.split('.').next().unwrap_or_default();
    let has_brand_mention = brand.len() > 3 && answer_lower.contains(brand);
    if has_brand_mention {
        score += 10;
        evidence.push(AttributionEvidence {
            kind: EvidenceKind::Brand,
            value: brand.to_string(),
            context: "Brand name mentioned".to_string(),
        });
    }

    AttributionScore {
        score: score.min(100) as u8,
        details: AttributionDetails {
            has_direct_url,
            has_domain_mention,
            has_brand_mention,
            evidence,
        },
    }
}

fn to_percent(ratio: f32) -> u8 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 on length mismatch or zero magnitude rather than
/// erroring; embeddings from the same backend always agree on length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
