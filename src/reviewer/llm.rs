//! Parsing of model responses into a structured review.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{LlmFinding, LlmReview};

/// Findings the model reports with confidence below this value are
/// discarded before aggregation.
pub const MIN_LLM_CONFIDENCE: f64 = 0.7;

/// Maximum length of response text echoed in parse warnings.
const RESPONSE_PREVIEW_LEN: usize = 2000;

/// Truncate a response for inclusion in a warning message.
pub fn preview(response: &str) -> &str {
    let mut end = response.len().min(RESPONSE_PREVIEW_LEN);
    while !response.is_char_boundary(end) {
        end -= 1;
    }
    &response[..end]
}

/// Parse the model response into a review.
///
/// With `output_schema` enforcing the JSON schema at the provider level,
/// the response is expected to be valid JSON. Some providers still wrap
/// it in markdown code fences or surrounding prose, so a few extraction
/// strategies are tried in order. A bare findings array is accepted and
/// wrapped with full confidence.
///
/// Returns `None` when no strategy yields valid JSON; the caller falls
/// back to an empty review rather than failing the run.
pub fn parse_review(response: &str) -> Option<LlmReview> {
    let trimmed = response.trim();

    if trimmed.is_empty() {
        return Some(LlmReview::empty());
    }

    for candidate in extract_json_candidates(trimmed) {
        if let Ok(review) = serde_json::from_str::<LlmReview>(&candidate) {
            return Some(review);
        }

        // A bare array of findings, without the wrapper object.
        if let Ok(findings) = serde_json::from_str::<Vec<LlmFinding>>(&candidate) {
            return Some(LlmReview {
                findings,
                confidence: 1.0,
                reasoning: String::new(),
            });
        }

        // A wrapper that has the findings but not the full shape,
        // e.g. {"findings": [...]} with the confidence omitted.
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&candidate) {
            if let Some(arr) = value.get("findings") {
                if let Ok(findings) = serde_json::from_value::<Vec<LlmFinding>>(arr.clone()) {
                    let confidence = value
                        .get("confidence")
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(1.0);
                    let reasoning = value
                        .get("reasoning")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return Some(LlmReview {
                        findings,
                        confidence,
                        reasoning,
                    });
                }
            }
        }
    }

    None
}

/// Regex for extracting content inside markdown code fences.
///
/// The closing ``` must appear at the start of a line (`\n````) to avoid
/// matching triple-backticks embedded inside JSON string values (e.g.
/// suggestion fields containing ```python code examples).
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").unwrap());

/// Extract candidate JSON strings from a response.
///
/// Returns the trimmed response itself, the outermost `{...}` and `[...]`
/// slices, plus any content inside markdown code fences.
fn extract_json_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    // First candidate: the raw text
    candidates.push(text.to_string());

    // Second: brace extraction — find the first '{' and last '}'.
    // This is the most robust strategy when the response embeds the
    // review object in prose or nests code fences inside JSON strings.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(text[start..=end].to_string());
        }
    }

    // Third: bracket extraction, for a bare findings array.
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            candidates.push(text[start..=end].to_string());
        }
    }

    // Fourth: extract content from markdown code fences.
    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            let inner_trimmed = inner.as_str().trim();
            if !inner_trimmed.is_empty() {
                candidates.push(inner_trimmed.to_string());
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Severity};

    const REVIEW_JSON: &str = r#"{
        "findings": [
            {
                "title": "Unvalidated index",
                "description": "The index comes straight from the request.",
                "category": "safety",
                "severity": "critical",
                "line": 14,
                "confidence": 0.9
            }
        ],
        "confidence": 0.8,
        "reasoning": "Small diff, clear issue."
    }"#;

    #[test]
    fn parse_direct_object() {
        let review = parse_review(REVIEW_JSON).unwrap();
        assert_eq!(review.findings.len(), 1);
        assert_eq!(review.confidence, 0.8);
        assert_eq!(review.findings[0].severity, Severity::Critical);
        assert_eq!(review.findings[0].category, Category::Safety);
        assert_eq!(review.findings[0].line, 14);
    }

    #[test]
    fn parse_fenced_object() {
        let response = format!("Here is the review:\n```json\n{REVIEW_JSON}\n```\n");
        let review = parse_review(&response).unwrap();
        assert_eq!(review.findings.len(), 1);
        assert_eq!(review.confidence, 0.8);
    }

    #[test]
    fn parse_object_embedded_in_prose() {
        let response = format!(
            "I reviewed the diff.\n\n{REVIEW_JSON}\n\nLet me know if anything is unclear."
        );
        let review = parse_review(&response).unwrap();
        assert_eq!(review.findings.len(), 1);
        assert_eq!(review.reasoning, "Small diff, clear issue.");
    }

    #[test]
    fn parse_bare_array_gets_full_confidence() {
        let response = r#"[{"title": "t", "description": "d", "category": "clarity", "severity": "info", "line": 3}]"#;
        let review = parse_review(response).unwrap();
        assert_eq!(review.confidence, 1.0);
        assert_eq!(review.findings.len(), 1);
        assert_eq!(review.findings[0].confidence, 1.0);
    }

    #[test]
    fn parse_wrapper_without_confidence() {
        let response = r#"{"findings": [{"title": "t", "description": "d", "category": "maintainability", "severity": "warning", "line": 7}]}"#;
        let review = parse_review(response).unwrap();
        assert_eq!(review.confidence, 1.0);
        assert_eq!(review.findings.len(), 1);
    }

    #[test]
    fn parse_empty_response() {
        let review = parse_review("").unwrap();
        assert!(review.findings.is_empty());
        assert_eq!(review.confidence, 0.0);
    }

    #[test]
    fn parse_whitespace_response() {
        let review = parse_review("   \n\t  ").unwrap();
        assert!(review.findings.is_empty());
    }

    #[test]
    fn parse_empty_findings_object() {
        let review =
            parse_review(r#"{"findings": [], "confidence": 0.95, "reasoning": "No issues."}"#)
                .unwrap();
        assert!(review.findings.is_empty());
        assert_eq!(review.confidence, 0.95);
    }

    #[test]
    fn parse_garbage_returns_none() {
        assert!(parse_review("I could not produce JSON today.").is_none());
    }

    #[test]
    fn parse_fence_with_nested_fence_in_suggestion() {
        let response = "```json\n{\"findings\": [{\"title\": \"t\", \"description\": \"d\", \
                        \"category\": \"clarity\", \"severity\": \"info\", \"line\": 1, \
                        \"suggestion\": \"Use:\\n```python\\nx = 1\\n```\"}], \
                        \"confidence\": 0.9}\n```";
        let review = parse_review(response).unwrap();
        assert_eq!(review.findings.len(), 1);
        assert!(review.findings[0]
            .suggestion
            .as_deref()
            .unwrap()
            .contains("x = 1"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(RESPONSE_PREVIEW_LEN);
        let p = preview(&long);
        assert!(p.len() <= RESPONSE_PREVIEW_LEN);
        assert!(p.chars().all(|c| c == 'é'));
    }

    #[test]
    fn preview_returns_short_responses_whole() {
        assert_eq!(preview("short"), "short");
    }
}
