//! Tiered claim extraction.
//!
//! Turns raw text chunks (or structured page metadata) into ordered
//! factual claims. Extraction is an explicit ordered list of tiers:
//! the OpenAI-backed tier, the Google-backed tier, then a rule-based
//! sentence splitter that always succeeds. A tier fails by being
//! unavailable, erroring, or returning unparseable output; the
//! coordinator moves on to the next tier and never escalates.
//!
//! The structured-data tier is independent: it derives claims from
//! JSON-LD, OpenGraph, and microdata deterministically, never calls a
//! provider, and silently skips missing fields.

pub mod prompts;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::providers::{estimate_tokens, ProviderFactory, ProviderId};
use crate::types::claim::{ClaimSource, ExtractedClaim, PageMetadata};
use crate::types::provider::{AiRequest, ChatMessage};

/// Chunks above this estimated token count are split before extraction.
const MAX_CHUNK_TOKENS: u32 = 1500;

/// Chunks shorter than this after trimming are skipped entirely.
const MIN_CHUNK_CHARS: usize = 30;

/// Sentences shorter than this are discarded by the rule-based tier.
const MIN_SENTENCE_CHARS: usize = 20;

/// Default confidence for LLM claims when the model reports none.
const LLM_DEFAULT_CONFIDENCE: f64 = 0.8;

/// Fixed confidence for rule-based claims.
const NLP_CONFIDENCE: f64 = 0.5;

/// Why an LLM tier produced no claims.
enum TierFailure {
    Unavailable,
    Failed(String),
}

/// Extracts factual claims from site content.
pub struct ClaimExtractor<F: ProviderFactory> {
    factory: F,
    /// LLM tiers in preference order.
    tiers: Vec<ProviderId>,
}

impl<F: ProviderFactory> ClaimExtractor<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            tiers: vec![ProviderId::OpenAi, ProviderId::Google],
        }
    }

    /// Override the LLM tier order (mostly for tests).
    pub fn with_tiers(mut self, tiers: Vec<ProviderId>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Extract claims from a text chunk.
    ///
    /// Oversized chunks are split on blank lines and processed
    /// recursively, preserving order; trivial chunks yield nothing.
    pub async fn extract_claims(&self, text: &str, domain: &str) -> Result<Vec<ExtractedClaim>> {
        self.extract_inner(text, domain).await
    }

    // Boxed for async recursion through the oversized-chunk guard.
    fn extract_inner<'a>(
        &'a self,
        text: &'a str,
        domain: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ExtractedClaim>>> + Send + 'a>> {
        Box::pin(async move {
            let trimmed = text.trim();
            if trimmed.chars().count() < MIN_CHUNK_CHARS {
                return Ok(vec![]);
            }

            if estimate_tokens(trimmed) > MAX_CHUNK_TOKENS {
                let segments: Vec<&str> = trimmed
                    .split("\n\n")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                if segments.len() > 1 {
                    debug!(segments = segments.len(), "splitting oversized chunk");
                    let mut claims = Vec::new();
                    for segment in segments {
                        claims.extend(self.extract_inner(segment, domain).await?);
                    }
                    return Ok(claims);
                }
            }

            for &tier in &self.tiers {
                match self.llm_tier(tier, trimmed, domain).await {
                    Ok(claims) => {
                        debug!(provider = %tier, count = claims.len(), "LLM tier extracted claims");
                        return Ok(claims);
                    }
                    Err(TierFailure::Unavailable) => {
                        debug!(provider = %tier, "tier unavailable, trying next");
                    }
                    Err(TierFailure::Failed(reason)) => {
                        debug!(provider = %tier, reason, "tier failed, trying next");
                    }
                }
            }

            Ok(self.rule_based_claims(trimmed))
        })
    }

    /// One LLM tier: unavailable provider, transport error, and
    /// unparseable output are all tier failures, never crate errors.
    async fn llm_tier(
        &self,
        id: ProviderId,
        text: &str,
        domain: &str,
    ) -> std::result::Result<Vec<ExtractedClaim>, TierFailure> {
        let provider = self.factory.create(id);
        if !provider.is_available() {
            return Err(TierFailure::Unavailable);
        }

        let request = AiRequest {
            messages: vec![
                ChatMessage::system(prompts::EXTRACT_CLAIMS_SYSTEM),
                ChatMessage::user(prompts::extract_claims_user(domain, text)),
            ],
            temperature: Some(0.2),
            max_tokens: None,
        };

        let response = provider
            .query(&request)
            .await
            .map_err(|e| TierFailure::Failed(e.to_string()))?;

        parse_claim_response(&response.content)
            .ok_or_else(|| TierFailure::Failed("response was not a JSON array".into()))
    }

    /// Rule-based fallback: one claim per sufficiently long sentence.
    ///
    /// Deterministic and idempotent: identical input always yields the
    /// same claims with confidence 0.5.
    pub fn rule_based_claims(&self, text: &str) -> Vec<ExtractedClaim> {
        text.split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| sentence.chars().count() >= MIN_SENTENCE_CHARS)
            .map(|sentence| ExtractedClaim::new(sentence, "fact", NLP_CONFIDENCE, ClaimSource::Nlp))
            .collect()
    }

    /// Derive claims from structured page markup.
    ///
    /// Never calls a provider and never fails: fields that are missing
    /// or of an unexpected shape are skipped.
    pub fn extract_claims_from_structured_data(
        &self,
        metadata: &PageMetadata,
        domain: &str,
    ) -> Vec<ExtractedClaim> {
        let mut claims = Vec::new();

        if let Some(title) = non_empty(&metadata.meta.title) {
            claims.push(
                ExtractedClaim::new(
                    format!("The site's page title is \"{title}\""),
                    "title",
                    0.9,
                    ClaimSource::Schema,
                )
                .with_triple(domain, "has title", title),
            );
        }

        if let Some(description) = non_empty(&metadata.meta.description) {
            claims.push(
                ExtractedClaim::new(
                    format!("{domain} describes itself as: {description}"),
                    "description",
                    0.85,
                    ClaimSource::Schema,
                )
                .with_triple(domain, "describes itself as", description),
            );
        }

        for object in metadata.json_ld.iter().flat_map(flatten_graph) {
            self.json_ld_claims(object, domain, &mut claims);
        }

        for item in &metadata.microdata {
            let name = item.get("name").and_then(Value::as_str);
            let item_type = item.get("type").and_then(Value::as_str);
            if let (Some(name), Some(item_type)) = (name, item_type) {
                let kind = item_type.rsplit('/').next().unwrap_or(item_type);
                claims.push(
                    ExtractedClaim::new(
                        format!("{name} is a {kind}"),
                        "identity",
                        0.85,
                        ClaimSource::Schema,
                    )
                    .with_triple(name, "is a", kind),
                );
            }
        }

        claims
    }

    fn json_ld_claims(&self, object: &Value, domain: &str, claims: &mut Vec<ExtractedClaim>) {
        let subject = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(domain)
            .to_string();

        if let Some(name) = object.get("name").and_then(Value::as_str) {
            claims.push(
                ExtractedClaim::new(
                    format!("The organization is named {name}"),
                    "identity",
                    0.95,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "is named", name),
            );
        }

        if let Some(description) = object.get("description").and_then(Value::as_str) {
            claims.push(
                ExtractedClaim::new(
                    format!("{subject} is described as: {description}"),
                    "description",
                    0.85,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "is described as", description),
            );
        }

        if let Some(founded) = object.get("foundingDate").and_then(Value::as_str) {
            claims.push(
                ExtractedClaim::new(
                    format!("{subject} was founded in {founded}"),
                    "founding",
                    0.95,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "founded in", founded),
            );
        }

        if let Some(employees) = scalar_string(object.get("numberOfEmployees")) {
            claims.push(
                ExtractedClaim::new(
                    format!("{subject} has {employees} employees"),
                    "scale",
                    0.9,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "has employees", employees),
            );
        }

        if let Some(address) = format_address(object.get("address")) {
            claims.push(
                ExtractedClaim::new(
                    format!("{subject} is located at {address}"),
                    "location",
                    0.9,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "located at", address),
            );
        }

        for key in ["offers", "makesOffer"] {
            for offer in as_slice(object.get(key)) {
                if let Some(offered) = offer_name(offer) {
                    claims.push(
                        ExtractedClaim::new(
                            format!("{subject} offers {offered}"),
                            "offering",
                            0.85,
                            ClaimSource::Schema,
                        )
                        .with_triple(&subject, "offers", offered),
                    );
                }
            }
        }

        if let Some(brand) = name_or_string(object.get("brand")) {
            claims.push(
                ExtractedClaim::new(
                    format!("{subject} carries the brand {brand}"),
                    "brand",
                    0.9,
                    ClaimSource::Schema,
                )
                .with_triple(&subject, "carries brand", brand),
            );
        }
    }
}

/// Flatten a JSON-LD object, expanding `@graph` containers.
fn flatten_graph(value: &Value) -> Vec<&Value> {
    match value.get("@graph").and_then(Value::as_array) {
        Some(graph) => graph.iter().collect(),
        None => vec![value],
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // schema.org QuantitativeValue
        Value::Object(obj) => scalar_string(obj.get("value")),
        _ => None,
    }
}

fn format_address(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => {
            let parts: Vec<&str> = [
                "streetAddress",
                "addressLocality",
                "addressRegion",
                "postalCode",
                "addressCountry",
            ]
            .iter()
            .filter_map(|key| obj.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

fn as_slice(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        Some(single) => std::slice::from_ref(single),
        None => &[],
    }
}

fn offer_name(offer: &Value) -> Option<&str> {
    offer
        .get("itemOffered")
        .and_then(|item| item.get("name"))
        .and_then(Value::as_str)
        .or_else(|| offer.get("name").and_then(Value::as_str))
        .or_else(|| offer.as_str())
}

fn name_or_string(value: Option<&Value>) -> Option<&str> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str),
        _ => None,
    }
}

/// Strip surrounding Markdown code fences from an LLM response.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Parse the LLM response into claims. Returns `None` on malformed JSON
/// or a non-array result so the coordinator can fall through.
fn parse_claim_response(content: &str) -> Option<Vec<ExtractedClaim>> {
    let value: Value = serde_json::from_str(strip_code_fences(content)).ok()?;
    let items = value.as_array()?;

    let claims = items
        .iter()
        .filter_map(|item| {
            let statement = item.get("statement").and_then(Value::as_str)?;
            let confidence = item
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(LLM_DEFAULT_CONFIDENCE);
            let claim_type = item
                .get("claimType")
                .or_else(|| item.get("claim_type"))
                .and_then(Value::as_str)
                .unwrap_or("fact");

            let mut claim =
                ExtractedClaim::new(statement, claim_type, confidence, ClaimSource::Llm);
            claim.subject = item.get("subject").and_then(Value::as_str).map(String::from);
            claim.predicate = item
                .get("predicate")
                .and_then(Value::as_str)
                .map(String::from);
            claim.object = item.get("object").and_then(Value::as_str).map(String::from);
            Some(claim)
        })
        .collect();

    Some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFactory, MockProvider};
    use serde_json::json;

    const LLM_JSON: &str = r#"[
        {"statement": "Acme was founded in 2020", "subject": "Acme", "predicate": "founded in", "object": "2020", "claimType": "founding", "confidence": 0.92},
        {"statement": "Acme employs 50 people"}
    ]"#;

    fn extractor_with(factory: MockFactory) -> ClaimExtractor<MockFactory> {
        ClaimExtractor::new(factory)
    }

    #[tokio::test]
    async fn trivial_chunks_yield_nothing() {
        let extractor = extractor_with(MockFactory::new());
        let claims = extractor.extract_claims("   too short   ", "acme.io").await.unwrap();
        assert!(claims.is_empty());
    }

    #[tokio::test]
    async fn chunk_guard_counts_characters_not_bytes() {
        let extractor = extractor_with(MockFactory::new());
        // 29 characters but 58 bytes; still below the 30-character minimum.
        let short = "ä".repeat(29);
        assert!(short.len() > MIN_CHUNK_CHARS);
        let claims = extractor.extract_claims(&short, "acme.io").await.unwrap();
        assert!(claims.is_empty());
    }

    #[tokio::test]
    async fn llm_tier_parses_claims_and_calibrates_confidence() {
        let provider = MockProvider::new("openai").with_response(LLM_JSON);
        let factory = MockFactory::new().with_provider(ProviderId::OpenAi, provider);
        let extractor = extractor_with(factory);

        let claims = extractor
            .extract_claims(
                "Acme was founded in 2020. It employs 50 people across Europe.",
                "acme.io",
            )
            .await
            .unwrap();

        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].source, ClaimSource::Llm);
        assert_eq!(claims[0].confidence, 0.92);
        assert_eq!(claims[0].subject.as_deref(), Some("Acme"));
        // Missing confidence defaults to 0.8.
        assert_eq!(claims[1].confidence, 0.8);
    }

    #[tokio::test]
    async fn fenced_json_is_parsed() {
        let fenced = format!("```json\n{LLM_JSON}\n```");
        let provider = MockProvider::new("openai").with_response(fenced);
        let factory = MockFactory::new().with_provider(ProviderId::OpenAi, provider);
        let extractor = extractor_with(factory);

        let claims = extractor
            .extract_claims("Acme was founded in 2020 and employs fifty people.", "acme.io")
            .await
            .unwrap();
        assert_eq!(claims.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_primary_falls_through_to_secondary() {
        let google = MockProvider::new("google").with_response(LLM_JSON);
        let factory = MockFactory::new()
            .with_provider(ProviderId::OpenAi, MockProvider::new("openai").unavailable())
            .with_provider(ProviderId::Google, google.clone());
        let extractor = extractor_with(factory);

        let claims = extractor
            .extract_claims("Acme was founded in 2020 and employs fifty people.", "acme.io")
            .await
            .unwrap();

        assert!(google.query_calls() > 0);
        assert!(claims.iter().all(|c| c.source == ClaimSource::Llm));
    }

    #[tokio::test]
    async fn unparseable_output_falls_back_to_rules() {
        let provider = MockProvider::new("openai").with_response("Sorry, I can't do that.");
        let factory = MockFactory::new().with_provider(ProviderId::OpenAi, provider);
        let extractor = extractor_with(factory);

        let claims = extractor
            .extract_claims(
                "Acme was founded in 2020. It employs fifty people in Berlin. Ok!",
                "acme.io",
            )
            .await
            .unwrap();

        assert_eq!(claims.len(), 2, "short trailing sentence is dropped");
        assert!(claims.iter().all(|c| c.source == ClaimSource::Nlp));
        assert!(claims.iter().all(|c| c.confidence == 0.5));
    }

    #[tokio::test]
    async fn no_providers_at_all_uses_rules() {
        let extractor = extractor_with(MockFactory::new());
        let claims = extractor
            .extract_claims("The warehouse ships worldwide. Orders arrive within five days.", "acme.io")
            .await
            .unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].source, ClaimSource::Nlp);
    }

    #[test]
    fn rule_tier_is_idempotent() {
        let extractor = extractor_with(MockFactory::new());
        let text = "Acme was founded in 2020! It employs fifty people in Berlin.";
        let first = extractor.rule_based_claims(text);
        let second = extractor.rule_based_claims(text);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.statement, b.statement);
            assert_eq!(a.confidence, 0.5);
        }
    }

    #[tokio::test]
    async fn oversized_chunks_split_losslessly() {
        // Two paragraphs, each well over the sentence minimum, with the
        // whole text over the token ceiling.
        let paragraph_a = "The first warehouse opened in Hamburg in 2018 and handles northern Europe. "
            .repeat(45);
        let paragraph_b = "The second warehouse opened in Lyon in 2021 and handles southern Europe. "
            .repeat(45);
        let text = format!("{paragraph_a}\n\n{paragraph_b}");
        assert!(estimate_tokens(&text) > 1500);

        let extractor = extractor_with(MockFactory::new());
        let split_claims = extractor.extract_claims(&text, "acme.io").await.unwrap();

        // Rule tier on the unsplit text gives the same statements in the
        // same order (the split is on paragraph boundaries only).
        let whole_claims = extractor.rule_based_claims(&text);
        assert_eq!(split_claims.len(), whole_claims.len());
        for (split, whole) in split_claims.iter().zip(&whole_claims) {
            assert_eq!(split.statement, whole.statement);
        }
    }

    #[test]
    fn structured_data_emits_schema_claims() {
        let metadata = PageMetadata {
            json_ld: vec![json!({
                "@type": "Organization",
                "name": "Acme",
                "description": "Logistics for small businesses",
                "foundingDate": "2020",
                "numberOfEmployees": {"value": 50},
                "address": {
                    "streetAddress": "12 Harbor Way",
                    "addressLocality": "Hamburg",
                    "postalCode": "20457"
                },
                "makesOffer": [
                    {"itemOffered": {"name": "Same-day delivery"}},
                    {"name": "Freight forwarding"}
                ],
                "brand": {"name": "AcmeShip"}
            })],
            meta: crate::types::claim::PageMeta {
                title: Some("Acme - Logistics".to_string()),
                description: Some("Acme ships parcels across Europe.".to_string()),
                ..Default::default()
            },
            microdata: vec![json!({
                "type": "https://schema.org/Organization",
                "name": "Acme GmbH"
            })],
        };

        let extractor = extractor_with(MockFactory::new());
        let claims = extractor.extract_claims_from_structured_data(&metadata, "acme.io");

        assert!(claims.iter().all(|c| c.source == ClaimSource::Schema));
        assert!(claims.iter().all(|c| (0.85..=0.95).contains(&c.confidence)));

        let statements: Vec<&str> = claims.iter().map(|c| c.statement.as_str()).collect();
        assert!(statements.contains(&"The site's page title is \"Acme - Logistics\""));
        assert!(statements.contains(&"Acme was founded in 2020"));
        assert!(statements.contains(&"Acme has 50 employees"));
        assert!(statements.contains(&"Acme offers Same-day delivery"));
        assert!(statements.contains(&"Acme offers Freight forwarding"));
        assert!(statements.contains(&"Acme carries the brand AcmeShip"));
        assert!(statements.contains(&"Acme GmbH is a Organization"));
        assert!(statements
            .iter()
            .any(|s| s.contains("12 Harbor Way, Hamburg, 20457")));
    }

    #[test]
    fn structured_data_skips_missing_fields() {
        let extractor = extractor_with(MockFactory::new());
        let claims =
            extractor.extract_claims_from_structured_data(&PageMetadata::default(), "acme.io");
        assert!(claims.is_empty());
    }

    #[test]
    fn graph_containers_are_flattened() {
        let metadata = PageMetadata {
            json_ld: vec![json!({
                "@graph": [
                    {"@type": "Organization", "name": "Acme", "foundingDate": "2020"},
                    {"@type": "WebSite", "name": "Acme Store"}
                ]
            })],
            ..Default::default()
        };

        let extractor = extractor_with(MockFactory::new());
        let claims = extractor.extract_claims_from_structured_data(&metadata, "acme.io");
        let statements: Vec<&str> = claims.iter().map(|c| c.statement.as_str()).collect();
        assert!(statements.contains(&"Acme was founded in 2020"));
        assert!(statements.contains(&"The organization is named Acme Store"));
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("[1]"), "[1]");
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  ```json\n[1]\n```  "), "[1]");
    }

    #[test]
    fn non_array_json_is_rejected() {
        assert!(parse_claim_response(r#"{"statement": "not an array"}"#).is_none());
        assert!(parse_claim_response("not json at all").is_none());
        assert_eq!(parse_claim_response("[]").unwrap().len(), 0);
    }
}
