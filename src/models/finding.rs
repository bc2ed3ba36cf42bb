//! Finding types shared by the rule engine and the LLM reviewer.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Severity of a finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational suggestion.
    Info,
    /// Should be addressed, does not block on its own.
    Warning,
    /// Must be fixed before merging.
    Critical,
}

/// Custom deserializer for Severity that accepts common LLM variations.
///
/// Models return labels like "High", "Error", "Low", "Blocker" despite
/// schema instructions. This normalizes them, falling back to Warning
/// for anything unrecognised rather than failing the parse.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::from_loose(&s))
    }
}

impl Severity {
    /// Map a free-form severity label to the closest variant.
    pub fn from_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "info" | "note" | "suggestion" | "low" | "minor" | "trivial" | "style" => {
                Severity::Info
            }
            "warning" | "warn" | "medium" | "moderate" | "major" => Severity::Warning,
            "critical" | "error" | "high" | "severe" | "blocker" | "fatal" => Severity::Critical,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Review category a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Safety,
    Clarity,
    Maintainability,
}

/// Tolerant deserializer mirroring the Severity one: LLMs label categories
/// loosely ("security", "bug", "style"), so map synonyms instead of failing.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Category::from_loose(&s))
    }
}

impl Category {
    /// Map a free-form category label to the closest variant.
    pub fn from_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "safety" | "security" | "bug" | "vulnerability" | "correctness" | "crash" => {
                Category::Safety
            }
            "clarity" | "readability" | "style" | "naming" | "documentation" | "docs" => {
                Category::Clarity
            }
            _ => Category::Maintainability,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Safety => write!(f, "safety"),
            Category::Clarity => write!(f, "clarity"),
            Category::Maintainability => write!(f, "maintainability"),
        }
    }
}

/// Exact source location where a rule or the LLM flagged code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Identifier of the rule that fired ("LLM" for model findings).
    pub rule_id: String,
    /// Path of the offending file, relative to the repository root.
    pub path: String,
    /// First flagged line in the new version of the file (1-based).
    pub start_line: u32,
    /// Last flagged line (inclusive). Equals `start_line` for single lines.
    pub end_line: u32,
    /// Column of the match within the line (1-based), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Short message describing what was matched.
    pub message: String,
    /// The offending source text, trimmed.
    pub snippet: String,
}

/// One reviewable issue, produced by either the rule engine or the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique id for this finding within a run.
    pub id: String,
    /// Rule that produced this finding ("LLM" for model findings).
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    /// Short title summarizing the issue.
    pub title: String,
    /// What is wrong, specific to this occurrence.
    pub description: String,
    /// Why this class of issue matters. Educational, not occurrence-specific.
    pub explanation: String,
    pub violation: Violation,
    /// Unified diff of a proposed fix. Advisory only, never applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Replacement source text the diff was generated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_code: Option<String>,
    /// Link to further reading, when the rule has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    /// Extra provenance, e.g. LLM confidence values.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl Finding {
    /// Fresh unique id for a finding.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Summary statistics for a review run.
///
/// Always derived from the findings, never stored alongside them, so the
/// counts cannot drift out of sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    /// Distinct files with at least one finding.
    pub files: usize,
}

impl Summary {
    /// Compute summary from a list of findings.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Summary::default();
        let mut files: HashSet<&str> = HashSet::new();

        for finding in findings {
            summary.total += 1;
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.info += 1,
            }
            files.insert(finding.violation.path.as_str());
        }

        summary.files = files.len();
        summary
    }
}
