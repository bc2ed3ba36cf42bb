//! Review outcome types and the exit-code contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gate::ContextCheck;
use crate::models::change::PrChanges;
use crate::models::finding::{Finding, Summary};

/// Terminal status of a review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Review completed, no blocking findings.
    Passed,
    /// Review completed, blocking findings present.
    Failed,
    /// Context gate declined to review; no quality judgement was made.
    Refused,
    /// Infrastructure failure before a verdict could be reached.
    Error,
}

impl ReviewStatus {
    /// CI exit code for this status.
    ///
    /// The mapping is fixed: 0 passed, 1 failed, 2 refused, 3 error.
    /// Pipelines depend on these values, so they never change with
    /// configuration; refusal tolerance is applied by the caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReviewStatus::Passed => 0,
            ReviewStatus::Failed => 1,
            ReviewStatus::Refused => 2,
            ReviewStatus::Error => 3,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Passed => write!(f, "passed"),
            ReviewStatus::Failed => write!(f, "failed"),
            ReviewStatus::Refused => write!(f, "refused"),
            ReviewStatus::Error => write!(f, "error"),
        }
    }
}

/// Complete outcome of one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub status: ReviewStatus,
    /// The reviewed PR snapshot. `None` when the fetch itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<PrChanges>,
    pub findings: Vec<Finding>,
    /// Context gate verdict. `None` when the run errored before the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextCheck>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
    /// Human-readable cause when `status` is Error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReviewResult {
    /// Result for a run that failed before reaching a verdict.
    pub fn error(message: impl Into<String>, duration_ms: u64) -> Self {
        ReviewResult {
            status: ReviewStatus::Error,
            changes: None,
            findings: Vec::new(),
            context: None,
            duration_ms,
            completed_at: Utc::now(),
            error: Some(message.into()),
        }
    }

    /// Aggregate counts over the findings, computed on demand.
    pub fn summary(&self) -> Summary {
        Summary::from_findings(&self.findings)
    }
}
