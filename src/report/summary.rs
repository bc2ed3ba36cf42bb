//! JSON summary renderer.
//!
//! Machine-readable run summary for dashboards and follow-on pipeline
//! steps. The exit code is included so consumers never re-derive the
//! contract from the status string.

use serde_json::json;

use crate::models::ReviewResult;

/// Render the run summary as pretty-printed JSON.
pub fn render(result: &ReviewResult) -> String {
    let summary = result.summary();

    let mut output = json!({
        "status": result.status,
        "exit_code": result.status.exit_code(),
        "summary": summary,
        "duration_ms": result.duration_ms,
        "completed_at": result.completed_at,
    });

    if let Some(changes) = &result.changes {
        output["pr"] = json!({
            "number": changes.number,
            "title": changes.title,
            "author": changes.author,
            "head_sha": changes.head_sha,
            "files": changes.file_count(),
            "additions": changes.total_additions(),
            "deletions": changes.total_deletions(),
        });
    }

    if let Some(context) = &result.context {
        output["context"] = json!(context);
    }

    if let Some(error) = &result.error {
        output["error"] = json!(error);
    }

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
