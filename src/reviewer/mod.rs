//! Per-file review pipeline.
//!
//! Each reviewable file goes through two passes over its changed lines:
//! the deterministic rule engine first, then the LLM. Rule findings come
//! first in the output and files keep their fetch order, so repeated runs
//! over the same diff produce reports in the same shape.

pub mod llm;
pub mod view;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;

use crate::fixes;
use crate::models::{
    Category, FileChange, Finding, LlmFinding, LlmReview, PrChanges, Severity, Violation,
};
use crate::providers::rig::{classify_error, is_retryable, retry_backoff, MAX_RETRIES};
use crate::providers::CompletionProvider;
use crate::rules::{RuleKind, RuleSet};
use llm::MIN_LLM_CONFIDENCE;
use view::ChangedView;

/// Rule id carried by model findings, distinguishing them from the
/// pattern rules in reports and summaries.
pub const LLM_RULE_ID: &str = "LLM";

/// System prompt for the review model. The JSON shape is additionally
/// enforced through `output_schema` where the provider supports it.
pub const SYSTEM_PROMPT: &str = "\
You are a senior engineer reviewing a pull request for a CI gate. \
You see only the changed portion of each file, with line numbers from \
the new version of the file. Report real problems introduced by the \
change: security flaws, bugs, error-handling gaps, and significant \
clarity issues. Do not comment on code you cannot see, do not restate \
style preferences, and do not pad the review. For every finding report \
your confidence that it is a genuine issue; low-confidence findings are \
dropped automatically, so guessing helps no one.";

/// Runs the rule engine and the review model over a change set.
pub struct Reviewer {
    rules: RuleSet,
    provider: Arc<dyn CompletionProvider>,
}

impl Reviewer {
    pub fn new(rules: RuleSet, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { rules, provider }
    }

    /// Review every reviewable file in the change set.
    ///
    /// Never fails: a file whose LLM pass cannot complete keeps its rule
    /// findings and the run carries on.
    pub async fn review(&self, changes: &PrChanges) -> Vec<Finding> {
        let mut findings = Vec::new();

        for file in &changes.files {
            let patch = match file.patch.as_deref() {
                Some(patch) if file.reviewable() => patch,
                _ => continue,
            };

            let view = ChangedView::from_patch(patch);
            if view.is_empty() {
                continue;
            }

            findings.extend(self.rule_findings(&view, &file.path));
            findings.extend(self.llm_findings(changes, file, &view).await);
        }

        findings
    }

    /// Run the pattern rules over the changed-code view of one file.
    ///
    /// Violations come back with view-relative line numbers and are
    /// remapped to new-file line numbers before conversion.
    fn rule_findings(&self, view: &ChangedView, path: &str) -> Vec<Finding> {
        self.rules
            .check_all(&view.text(), path)
            .into_iter()
            .filter_map(|mut violation| {
                let start = view.map_line(violation.start_line)?;
                let end = view.map_line(violation.end_line).unwrap_or(start);
                violation.start_line = start;
                violation.end_line = end;
                Some(rule_finding(violation))
            })
            .collect()
    }

    async fn llm_findings(
        &self,
        changes: &PrChanges,
        file: &FileChange,
        view: &ChangedView,
    ) -> Vec<Finding> {
        let prompt = build_prompt(changes, file, view);
        let review = self.complete_with_retries(&prompt, &file.path).await;
        let review_confidence = review.confidence;

        review
            .findings
            .into_iter()
            .filter(|finding| finding.confidence >= MIN_LLM_CONFIDENCE)
            .map(|finding| llm_finding(finding, &file.path, review_confidence))
            .collect()
    }

    /// Call the provider, retrying transient failures with backoff.
    ///
    /// Anything that still fails degrades to an empty review so the rule
    /// findings for the file survive.
    async fn complete_with_retries(&self, prompt: &str, path: &str) -> LlmReview {
        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            match self.provider.complete(SYSTEM_PROMPT, prompt).await {
                Ok(response) => {
                    return match llm::parse_review(&response) {
                        Some(review) => review,
                        None => {
                            eprintln!(
                                "Warning: model response for {path} is not review JSON; \
                                 keeping rule findings only. Response: {}",
                                llm::preview(&response)
                            );
                            LlmReview::empty()
                        }
                    };
                }
                Err(ref e) if is_retryable(e) && attempt < MAX_RETRIES => {
                    let backoff = retry_backoff(attempt);
                    let reason = classify_error(e).unwrap_or("Transient error");
                    eprintln!(
                        "Warning: {reason}; retrying {path} in {}s (attempt {}/{})",
                        backoff.as_secs(),
                        attempt + 1,
                        MAX_RETRIES + 1,
                    );
                    tokio::time::sleep(backoff).await;
                    last_err = Some(format!("{e}"));
                }
                Err(e) => {
                    eprintln!(
                        "Warning: LLM review of {path} failed: {e}; keeping rule findings only"
                    );
                    return LlmReview::empty();
                }
            }
        }

        eprintln!(
            "Warning: LLM review of {path} failed: {}; keeping rule findings only",
            last_err.unwrap_or_else(|| "max retries exhausted".to_string())
        );
        LlmReview::empty()
    }
}

/// Decide whether a set of findings fails the gate.
///
/// Critical findings always fail. In strict mode warnings fail too.
/// Info findings never affect the outcome.
pub fn should_fail(findings: &[Finding], strict: bool) -> bool {
    findings.iter().any(|finding| match finding.severity {
        Severity::Critical => true,
        Severity::Warning => strict,
        Severity::Info => false,
    })
}

fn rule_finding(violation: Violation) -> Finding {
    let kind = RuleKind::from_id(&violation.rule_id);
    let (category, severity) = match kind {
        Some(kind) => (kind.category(), kind.severity()),
        None => (Category::Maintainability, Severity::Warning),
    };
    let suggested_code = fixes::fix_for_violation(&violation);
    let suggested_fix = suggested_code
        .as_deref()
        .map(|code| fixes::fix_diff(&violation.snippet, code, &violation.path))
        .filter(|diff| fixes::validate_diff(diff));

    Finding {
        id: Finding::new_id(),
        rule_id: violation.rule_id.clone(),
        category,
        severity,
        title: kind
            .map(|kind| kind.title().to_string())
            .unwrap_or_else(|| violation.message.clone()),
        description: violation.message.clone(),
        explanation: kind
            .map(|kind| kind.why_matters().to_string())
            .unwrap_or_default(),
        docs_url: kind.and_then(RuleKind::docs_url).map(str::to_string),
        suggested_fix,
        suggested_code,
        metadata: IndexMap::new(),
        violation,
    }
}

fn llm_finding(raw: LlmFinding, path: &str, review_confidence: f64) -> Finding {
    let start = raw.line.max(1);
    let end = raw.end_line.unwrap_or(start).max(start);
    let snippet = raw.snippet.clone().unwrap_or_default();

    let suggested_fix = match (raw.snippet.as_deref(), raw.suggestion.as_deref()) {
        (Some(original), Some(code)) if !original.trim().is_empty() => {
            let diff = fixes::fix_diff(original, code, path);
            fixes::validate_diff(&diff).then_some(diff)
        }
        _ => None,
    };

    let mut metadata = IndexMap::new();
    metadata.insert("confidence".to_string(), json!(raw.confidence));
    metadata.insert("review_confidence".to_string(), json!(review_confidence));

    Finding {
        id: Finding::new_id(),
        rule_id: LLM_RULE_ID.to_string(),
        category: raw.category,
        severity: raw.severity,
        title: raw.title.clone(),
        description: raw.description,
        explanation: String::new(),
        docs_url: None,
        suggested_fix,
        suggested_code: raw.suggestion,
        metadata,
        violation: Violation {
            rule_id: LLM_RULE_ID.to_string(),
            path: path.to_string(),
            start_line: start,
            end_line: end,
            column: None,
            message: raw.title,
            snippet,
        },
    }
}

/// Build the user prompt for a single file review.
fn build_prompt(changes: &PrChanges, file: &FileChange, view: &ChangedView) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "## Pull Request\n\n\
         - Title: {}\n\
         - Author: {}\n\
         - Branch: {} -> {}\n\
         - Files changed: {}\n\n",
        changes.title,
        changes.author,
        changes.head_ref,
        changes.base_ref,
        changes.file_count(),
    ));

    if !changes.body.trim().is_empty() {
        prompt.push_str(&format!("### Description\n\n{}\n\n", changes.body.trim()));
    }

    prompt.push_str(&format!(
        "## Changed Lines: {} ({}, +{} -{})\n\n\
         Line numbers refer to the new version of the file. Removed lines \
         are not shown.\n\n```\n{}\n```\n\n",
        file.path,
        file.status,
        file.additions,
        file.deletions,
        view.numbered(),
    ));

    prompt.push_str(&format!(
        "## Instructions\n\n\
         Review the changed lines above for file `{}`. \
         Return a single JSON object with:\n\
         - \"findings\": array of findings (empty if the change is clean)\n\
         - \"confidence\": number 0.0-1.0, your confidence in the review as a whole\n\
         - \"reasoning\": one or two sentences on how you judged the change\n\n\
         Each finding MUST include:\n\
         - \"title\": short summary of the issue\n\
         - \"description\": detailed explanation, actionable for the author\n\
         - \"category\": MUST be exactly one of: \"safety\", \"clarity\", \"maintainability\"\n\
         - \"severity\": MUST be exactly one of: \"critical\", \"warning\", \"info\"\n\
         - \"line\": the line number the issue starts on, as shown above\n\
         - \"end_line\": (optional) the line the issue ends on\n\
         - \"snippet\": (optional) the offending code, verbatim\n\
         - \"suggestion\": (optional) replacement code for the snippet\n\
         - \"confidence\": number 0.0-1.0 for this single finding\n\n\
         IMPORTANT: The \"severity\" field must be one of \"critical\", \"warning\", or \"info\". \
         Do NOT use values like \"error\", \"major\", \"minor\", \"high\", or \"low\".\n\n\
         If there are no issues, return: {{\"findings\": [], \"confidence\": 1.0, \"reasoning\": \"...\"}}\n",
        file.path,
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileStatus;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        response: String,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            // Not in the transient-error table, so no retries happen.
            Err(ProviderError::ApiError("model exploded".to_string()))
        }
    }

    const CLEAN_REVIEW: &str = r#"{"findings": [], "confidence": 1.0, "reasoning": "ok"}"#;

    fn file(path: &str, patch: &str) -> FileChange {
        FileChange {
            path: path.to_string(),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 0,
            changes: 1,
            patch: Some(patch.to_string()),
            previous_path: None,
        }
    }

    fn changes_with(files: Vec<FileChange>) -> PrChanges {
        let changed_files = files.len();
        PrChanges {
            number: 42,
            title: "Add db helpers".into(),
            body: String::new(),
            author: "dev".into(),
            base_ref: "main".into(),
            head_ref: "feature/db".into(),
            base_sha: "aaa".into(),
            head_sha: "bbb".into(),
            files,
            additions: 1,
            deletions: 0,
            changed_files,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const SECRET_PATCH: &str = "@@ -10,2 +10,3 @@\n def connect():\n+    password = \"hardcoded123\"\n     return db.connect()";

    #[tokio::test]
    async fn rule_findings_get_new_file_line_numbers() {
        let reviewer = Reviewer::new(RuleSet::builtin(), Arc::new(MockProvider::new(CLEAN_REVIEW)));
        let changes = changes_with(vec![file("src/db.py", SECRET_PATCH)]);

        let findings = reviewer.review(&changes).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "SEC002");
        assert_eq!(findings[0].severity, Severity::Critical);
        // The '+' line is the second line of a hunk starting at 10.
        assert_eq!(findings[0].violation.start_line, 11);
        assert_eq!(findings[0].violation.path, "src/db.py");
    }

    #[tokio::test]
    async fn low_confidence_model_findings_are_dropped() {
        let response = r#"{
            "findings": [
                {"title": "Real issue", "description": "d", "category": "safety",
                 "severity": "warning", "line": 11, "confidence": 0.9},
                {"title": "Wild guess", "description": "d", "category": "clarity",
                 "severity": "info", "line": 11, "confidence": 0.4}
            ],
            "confidence": 0.8,
            "reasoning": "r"
        }"#;
        let reviewer = Reviewer::new(RuleSet::builtin(), Arc::new(MockProvider::new(response)));
        let changes = changes_with(vec![file(
            "src/app.py",
            "@@ -10,1 +10,2 @@\n context\n+added_line()",
        )]);

        let findings = reviewer.review(&changes).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Real issue");
        assert_eq!(findings[0].rule_id, LLM_RULE_ID);
        assert_eq!(findings[0].metadata["confidence"], json!(0.9));
        assert_eq!(findings[0].metadata["review_confidence"], json!(0.8));
    }

    #[tokio::test]
    async fn findings_at_exactly_the_cutoff_survive() {
        let response = r#"{
            "findings": [{"title": "Borderline", "description": "d", "category": "clarity",
                          "severity": "info", "line": 10, "confidence": 0.7}],
            "confidence": 0.7,
            "reasoning": "r"
        }"#;
        let reviewer = Reviewer::new(RuleSet::builtin(), Arc::new(MockProvider::new(response)));
        let changes = changes_with(vec![file("a.py", "@@ -10,0 +10,1 @@\n+x = 1")]);

        let findings = reviewer.review(&changes).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Borderline");
    }

    #[tokio::test]
    async fn rule_findings_precede_model_findings_per_file() {
        let response = r#"{
            "findings": [{"title": "Model note", "description": "d", "category": "clarity",
                          "severity": "info", "line": 11, "confidence": 0.9}],
            "confidence": 0.9,
            "reasoning": "r"
        }"#;
        let reviewer = Reviewer::new(RuleSet::builtin(), Arc::new(MockProvider::new(response)));
        let changes = changes_with(vec![
            file("src/db.py", SECRET_PATCH),
            file("src/ok.py", "@@ -1,0 +1,1 @@\n+value = compute()"),
        ]);

        let findings = reviewer.review(&changes).await;
        let order: Vec<(&str, &str)> = findings
            .iter()
            .map(|f| (f.violation.path.as_str(), f.rule_id.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                ("src/db.py", "SEC002"),
                ("src/db.py", "LLM"),
                ("src/ok.py", "LLM"),
            ]
        );
    }

    #[tokio::test]
    async fn removed_and_patchless_files_are_skipped() {
        let provider = Arc::new(MockProvider::new(CLEAN_REVIEW));
        let mut removed = file("gone.py", SECRET_PATCH);
        removed.status = FileStatus::Removed;
        let mut patchless = file("blob.bin", "");
        patchless.patch = None;

        let reviewer = Reviewer::new(RuleSet::builtin(), provider.clone());
        let findings = reviewer
            .review(&changes_with(vec![removed, patchless]))
            .await;

        assert!(findings.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_rule_findings() {
        let reviewer = Reviewer::new(RuleSet::builtin(), Arc::new(FailingProvider));
        let changes = changes_with(vec![file("src/db.py", SECRET_PATCH)]);

        let findings = reviewer.review(&changes).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "SEC002");
    }

    #[tokio::test]
    async fn unparseable_response_degrades_to_rule_findings() {
        let reviewer = Reviewer::new(
            RuleSet::builtin(),
            Arc::new(MockProvider::new("I am not JSON")),
        );
        let changes = changes_with(vec![file("src/db.py", SECRET_PATCH)]);

        let findings = reviewer.review(&changes).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "SEC002");
    }

    #[test]
    fn should_fail_on_critical() {
        let violation = Violation {
            rule_id: "SEC001".into(),
            path: "a.py".into(),
            start_line: 1,
            end_line: 1,
            column: None,
            message: "m".into(),
            snippet: "s".into(),
        };
        let mut finding = rule_finding(violation);

        finding.severity = Severity::Critical;
        assert!(should_fail(std::slice::from_ref(&finding), false));

        finding.severity = Severity::Warning;
        assert!(!should_fail(std::slice::from_ref(&finding), false));
        assert!(should_fail(std::slice::from_ref(&finding), true));

        finding.severity = Severity::Info;
        assert!(!should_fail(std::slice::from_ref(&finding), false));
        assert!(!should_fail(std::slice::from_ref(&finding), true));

        assert!(!should_fail(&[], true));
    }

    #[test]
    fn rule_finding_carries_rule_metadata() {
        let violation = Violation {
            rule_id: "SEC002".into(),
            path: "src/db.py".into(),
            start_line: 11,
            end_line: 11,
            column: Some(5),
            message: "Credential assigned directly in source".into(),
            snippet: "password = \"hardcoded123\"".into(),
        };
        let finding = rule_finding(violation);

        assert_eq!(finding.category, Category::Safety);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.title, "Hardcoded credential");
        assert!(!finding.explanation.is_empty());
        assert!(finding.docs_url.is_some());
        // SEC002 has a rewrite, so both fix forms are present.
        assert!(finding.suggested_code.is_some());
        assert!(finding.suggested_fix.is_some());
    }

    #[test]
    fn llm_finding_builds_fix_diff_from_snippet_and_suggestion() {
        let raw = LlmFinding {
            title: "Off by one".into(),
            description: "Loop misses the last element.".into(),
            category: Category::Maintainability,
            severity: Severity::Warning,
            line: 12,
            end_line: None,
            snippet: Some("for i in range(len(xs) - 1):".into()),
            suggestion: Some("for i in range(len(xs)):".into()),
            confidence: 0.9,
        };
        let finding = llm_finding(raw, "src/loop.py", 0.85);

        assert_eq!(finding.rule_id, LLM_RULE_ID);
        assert_eq!(finding.violation.start_line, 12);
        assert_eq!(finding.violation.end_line, 12);
        let diff = finding.suggested_fix.unwrap();
        assert!(diff.contains("-for i in range(len(xs) - 1):"));
        assert!(diff.contains("+for i in range(len(xs)):"));
    }

    #[test]
    fn prompt_includes_numbered_lines_and_format_contract() {
        let changes = changes_with(vec![file("src/db.py", SECRET_PATCH)]);
        let view = ChangedView::from_patch(SECRET_PATCH);
        let prompt = build_prompt(&changes, &changes.files[0], &view);

        assert!(prompt.contains("## Changed Lines: src/db.py"));
        assert!(prompt.contains("11:     password = \"hardcoded123\""));
        assert!(prompt.contains("MUST be exactly one of: \"critical\", \"warning\", \"info\""));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("Review the changed lines above for file `src/db.py`"));
    }

    #[test]
    fn prompt_includes_body_when_present() {
        let mut changes = changes_with(vec![file("a.py", "@@ -1,0 +1,1 @@\n+x = 1")]);
        changes.body = "Adds the login flow.".into();
        let view = ChangedView::from_patch("@@ -1,0 +1,1 @@\n+x = 1");

        let prompt = build_prompt(&changes, &changes.files[0], &view);
        assert!(prompt.contains("### Description"));
        assert!(prompt.contains("Adds the login flow."));

        changes.body = String::new();
        let prompt = build_prompt(&changes, &changes.files[0], &view);
        assert!(!prompt.contains("### Description"));
    }
}
