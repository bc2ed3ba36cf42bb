//! Wire types for structured LLM review responses.
//!
//! These define the JSON shape the model is instructed (and, where the
//! provider supports it, schema-constrained) to produce. Parsing lives
//! in `reviewer::llm`; conversion to domain findings in `reviewer`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::finding::{Category, Severity};

/// Structured response requested from the model for one file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmReview {
    /// Issues found in the changed lines.
    pub findings: Vec<LlmFinding>,
    /// Overall confidence in this review, 0.0 to 1.0.
    pub confidence: f64,
    /// Short reasoning summary.
    #[serde(default)]
    pub reasoning: String,
}

impl LlmReview {
    /// A review carrying no findings and zero confidence. Used when the
    /// model's output could not be understood, so the file degrades to
    /// rule-based findings only.
    pub fn empty() -> Self {
        LlmReview {
            findings: Vec::new(),
            confidence: 0.0,
            reasoning: String::new(),
        }
    }
}

/// A single issue reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmFinding {
    /// Short title summarizing the issue.
    pub title: String,
    /// What is wrong and why, specific to this occurrence.
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    /// First affected line in the new version of the file (1-based).
    pub line: u32,
    /// Last affected line, when the issue spans several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// The offending code, quoted from the diff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Suggested replacement code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Per-finding confidence, 0.0 to 1.0. Models that omit it are taken
    /// at full confidence rather than silently filtered out.
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}
