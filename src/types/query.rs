//! Sites, queries, and expected answers.
//!
//! Queries (and their expected answers) are produced by query generation
//! upstream and are read-only to the evaluation core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A site under evaluation.
///
/// The core only needs the id and the domain string; everything else about
/// a site (crawl state, pages, chunks) lives with the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,

    /// Bare domain, no scheme, no leading `www.` (e.g. `example.com`).
    pub domain: String,

    pub name: Option<String>,

    /// When the last analysis run completed for this site.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl Site {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            name: None,
            last_run_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The structured reference a generated answer is scored against.
///
/// Immutable once its query is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAnswer {
    /// Factual statements a good answer should reflect, in priority order.
    #[serde(default)]
    pub key_claims: Vec<String>,

    /// Keywords checked as case-insensitive substrings of the answer.
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub must_include: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_include: Option<Vec<String>>,
}

/// User intent behind a test query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Informational,
    Navigational,
    Comparison,
    Transactional,
}

/// How hard the query is expected to be for an assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Priority weight used to order queries within a run.
    ///
    /// Easy queries run first: they are the baseline facts an assistant
    /// should never get wrong.
    pub fn priority_score(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 0.7,
            Difficulty::Hard => 0.4,
        }
    }
}

/// A test query owned by a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub site_id: Uuid,

    /// Canonical query text, sent verbatim as the sole user message.
    pub canonical: String,

    pub query_type: QueryType,
    pub topic: String,
    pub difficulty: Difficulty,

    /// Derived from difficulty; see [`Difficulty::priority_score`].
    pub priority_score: f64,

    pub expected_answer: ExpectedAnswer,

    /// Disabled queries are excluded from runs.
    pub enabled: bool,
}

impl Query {
    pub fn new(site_id: Uuid, canonical: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            canonical: canonical.into(),
            query_type: QueryType::Informational,
            topic: "general".to_string(),
            difficulty,
            priority_score: difficulty.priority_score(),
            expected_answer: ExpectedAnswer::default(),
            enabled: true,
        }
    }

    pub fn with_expected_answer(mut self, expected: ExpectedAnswer) -> Self {
        self.expected_answer = expected;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_follows_difficulty() {
        assert_eq!(Difficulty::Easy.priority_score(), 1.0);
        assert_eq!(Difficulty::Medium.priority_score(), 0.7);
        assert_eq!(Difficulty::Hard.priority_score(), 0.4);
    }

    #[test]
    fn expected_answer_round_trips_camel_case() {
        let json = r#"{"keyClaims":["a"],"keywords":["b"],"mustInclude":[]}"#;
        let parsed: ExpectedAnswer = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.key_claims, vec!["a"]);
        assert_eq!(parsed.keywords, vec!["b"]);
        assert!(parsed.should_include.is_none());
    }
}
