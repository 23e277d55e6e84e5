//! Extracted factual claims and the structured page metadata they can
//! be derived from.

use serde::{Deserialize, Serialize};

/// Which extraction tier produced a claim.
///
/// Confidence is calibrated by source: LLM claims default to 0.8 unless
/// the model reports its own, rule-based claims are fixed at 0.5, and
/// schema-derived claims range 0.85-0.95 by field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimSource {
    Llm,
    Nlp,
    Schema,
}

/// A structured factual statement extracted from site content.
///
/// Claims are append-only: never mutated after creation, only
/// bulk-replaced on re-extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedClaim {
    pub statement: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    pub claim_type: String,

    /// In [0, 1].
    pub confidence: f64,

    pub source: ClaimSource,
}

impl ExtractedClaim {
    pub fn new(
        statement: impl Into<String>,
        claim_type: impl Into<String>,
        confidence: f64,
        source: ClaimSource,
    ) -> Self {
        Self {
            statement: statement.into(),
            subject: None,
            predicate: None,
            object: None,
            claim_type: claim_type.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn with_triple(
        mut self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        self.subject = Some(subject.into());
        self.predicate = Some(predicate.into());
        self.object = Some(object.into());
        self
    }
}

/// OpenGraph / `<meta>` tag content extracted by the DOM chunker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub page_type: Option<String>,
    pub url: Option<String>,
}

/// Structured markup handed to the claim extractor by the (external)
/// HTML extraction subsystem.
///
/// JSON-LD objects and microdata items are kept as raw JSON; the schema
/// tier picks out the fields it understands and skips the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub json_ld: Vec<serde_json::Value>,

    #[serde(default)]
    pub meta: PageMeta,

    #[serde(default)]
    pub microdata: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ClaimSource::Llm).unwrap(), "\"llm\"");
        assert_eq!(serde_json::to_string(&ClaimSource::Nlp).unwrap(), "\"nlp\"");
        assert_eq!(
            serde_json::to_string(&ClaimSource::Schema).unwrap(),
            "\"schema\""
        );
    }

    #[test]
    fn confidence_is_clamped() {
        let claim = ExtractedClaim::new("x", "fact", 1.7, ClaimSource::Llm);
        assert_eq!(claim.confidence, 1.0);
        let claim = ExtractedClaim::new("x", "fact", -0.2, ClaimSource::Llm);
        assert_eq!(claim.confidence, 0.0);
    }
}
