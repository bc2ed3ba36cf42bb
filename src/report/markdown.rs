//! Markdown report renderer.
//!
//! Layout depends on the outcome: verdict reports list findings grouped
//! by severity, refusals explain themselves instead of listing findings,
//! and error reports point at the job log. Suggested fixes are always
//! presented as advisory; the report never claims a change was applied.

use crate::constants::AI_DISCLOSURE;
use crate::models::{Finding, ReviewResult, ReviewStatus, Severity};

/// Render the full markdown report for a run.
pub fn render(result: &ReviewResult, strict: bool) -> String {
    let mut out = String::new();

    match &result.changes {
        Some(changes) => out.push_str(&format!(
            "# Code Review: {} (#{})\n\n",
            changes.title, changes.number
        )),
        None => out.push_str("# Code Review\n\n"),
    }

    match result.status {
        ReviewStatus::Passed | ReviewStatus::Failed => render_verdict(&mut out, result, strict),
        ReviewStatus::Refused => render_refusal(&mut out, result),
        ReviewStatus::Error => render_run_error(&mut out, result),
    }

    out.push_str(&format!(
        "\n---\n\n_Completed in {} ms. {}_\n",
        result.duration_ms, AI_DISCLOSURE
    ));

    out
}

/// Format one finding as an inline review comment body.
pub fn inline_comment(finding: &Finding) -> String {
    let severity_emoji = match finding.severity {
        Severity::Critical => "🔴",
        Severity::Warning => "🟡",
        Severity::Info => "🔵",
    };

    let mut body = format!(
        "{} **{}** ({} · {})\n\n{}",
        severity_emoji, finding.title, finding.severity, finding.rule_id, finding.description
    );

    if let Some(ref code) = finding.suggested_code {
        body.push_str(&format!(
            "\n\n**Suggested change (advisory):**\n```\n{code}\n```"
        ));
    }

    body.push_str(&format!("\n\n_{AI_DISCLOSURE}_"));
    body
}

fn render_verdict(out: &mut String, result: &ReviewResult, strict: bool) {
    let summary = result.summary();

    match result.status {
        ReviewStatus::Passed => out.push_str("**Status:** ✅ Passed\n\n"),
        _ => out.push_str("**Status:** ❌ Failed — changes requested\n\n"),
    }

    if summary.total == 0 {
        out.push_str("No findings. The change looks good to merge.\n");
        return;
    }

    out.push_str(&format!(
        "{} {} across {} {}: {} critical, {} {}, {} info.\n\n",
        summary.total,
        if summary.total == 1 { "finding" } else { "findings" },
        summary.files,
        if summary.files == 1 { "file" } else { "files" },
        summary.critical,
        summary.warnings,
        if summary.warnings == 1 { "warning" } else { "warnings" },
        summary.info,
    ));

    if result.status == ReviewStatus::Failed && strict && summary.critical == 0 {
        out.push_str("Strict mode is on: warnings block the gate.\n\n");
    }

    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        let group: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }

        let heading = match severity {
            Severity::Critical => "Critical",
            Severity::Warning => "Warnings",
            Severity::Info => "Info",
        };
        out.push_str(&format!("## {heading}\n\n"));
        for finding in group {
            render_finding(out, finding);
        }
    }

    if result.findings.iter().any(|f| f.suggested_fix.is_some()) {
        render_fix_instructions(out);
    }
}

fn render_finding(out: &mut String, finding: &Finding) {
    let v = &finding.violation;
    let location = if v.end_line > v.start_line {
        format!("{}:{}-{}", v.path, v.start_line, v.end_line)
    } else {
        format!("{}:{}", v.path, v.start_line)
    };

    out.push_str(&format!("### `{location}` — {}\n\n", finding.title));
    out.push_str(&format!(
        "**{}** · {} · {}\n\n",
        finding.rule_id, finding.category, finding.severity
    ));
    out.push_str(&format!("{}\n\n", finding.description));

    if !v.snippet.is_empty() {
        out.push_str(&format!("```\n{}\n```\n\n", v.snippet));
    }

    if !finding.explanation.is_empty() {
        out.push_str(&format!("**Why it matters:** {}\n\n", finding.explanation));
    }

    if let Some(ref diff) = finding.suggested_fix {
        out.push_str(&format!(
            "**Suggested fix (advisory):**\n\n```diff\n{diff}```\n\n"
        ));
    } else if let Some(ref code) = finding.suggested_code {
        out.push_str(&format!(
            "**Suggested change (advisory):**\n\n```\n{code}\n```\n\n"
        ));
    }

    if let Some(ref url) = finding.docs_url {
        out.push_str(&format!("[Learn more]({url})\n\n"));
    }
}

fn render_fix_instructions(out: &mut String) {
    out.push_str(
        "## Applying suggested fixes\n\n\
         Suggested fixes are advisory. Nothing has been changed on this branch; \
         the gate never commits to it.\n\n\
         1. Review each suggested diff and decide whether it is correct for this codebase.\n\
         2. Apply the ones you accept manually, or `git apply` the downloaded patch artifact.\n\
         3. Run the project's tests.\n\
         4. Commit and push; the gate re-runs on the new head.\n\n",
    );
}

fn render_refusal(out: &mut String, result: &ReviewResult) {
    out.push_str("**Status:** ⚠️ Refused — insufficient context\n\n");
    out.push_str(
        "The gate did not attempt this review: an automated pass over this \
         change would be too unreliable to trust.\n\n",
    );

    if let Some(check) = &result.context {
        if let Some(reason) = &check.reason {
            out.push_str(&format!("**Reason:** {reason}\n\n"));
        }
        if let Some(suggestion) = &check.suggestion {
            out.push_str(&format!("**What to do:** {suggestion}\n\n"));
        }
    }

    out.push_str(
        "No findings were produced and no quality judgement was made. \
         Adjust the change (or the gate thresholds) and push again to re-run \
         the review.\n",
    );
}

fn render_run_error(out: &mut String, result: &ReviewResult) {
    out.push_str("**Status:** 💥 Error\n\n");
    out.push_str("The review could not run to completion.\n\n");

    if let Some(error) = &result.error {
        out.push_str(&format!("**Error:** {error}\n\n"));
    }

    out.push_str(
        "This is an infrastructure failure, not a verdict on the change. \
         Check the job log, then re-run the workflow.\n",
    );
}
