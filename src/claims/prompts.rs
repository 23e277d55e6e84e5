//! LLM prompts for claim extraction.

/// System prompt for the LLM extraction tier.
///
/// Asks for verifiable facts only and a bare JSON array so the response
/// survives `serde_json` parsing after fence stripping.
pub const EXTRACT_CLAIMS_SYSTEM: &str = r#"You extract verifiable factual claims from website content.

Extract only facts that could be checked against the real world: dates, numbers, names, locations, products, capabilities. Exclude opinions, marketing language, and calls to action.

Respond with a JSON array only, no prose:
[
  {
    "statement": "full factual statement in plain language",
    "subject": "who or what the claim is about",
    "predicate": "the relationship",
    "object": "the value or target",
    "claimType": "fact" | "founding" | "location" | "scale" | "offering" | "identity",
    "confidence": 0.0 to 1.0
  }
]

Subject, predicate, and object are optional; omit them when the decomposition is unclear. Return [] if the text contains no verifiable facts."#;

/// User prompt template for the LLM extraction tier.
pub fn extract_claims_user(domain: &str, text: &str) -> String {
    format!("Website: {domain}\n\nContent:\n{text}")
}
