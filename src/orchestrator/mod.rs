//! The review pipeline: fetch, gate, review, publish, artifacts.
//!
//! One PR goes through the stages strictly in order; there is no fan-out
//! and no retry at this level. Resilience lives in the outbound calls
//! (the host client and the provider), so whatever happens out there, the
//! pipeline always produces a `ReviewResult` and a deterministic exit
//! code. Publishing and artifact writing are best-effort: their failures
//! are logged and never change the verdict.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use colored::Colorize;

use crate::config::Config;
use crate::fixes;
use crate::gate;
use crate::host::{CommitState, HostApi, InlineComment, ReviewEvent};
use crate::models::{ReviewResult, ReviewStatus};
use crate::report::{markdown, summary};
use crate::reviewer::{self, Reviewer};

/// Pipeline stages in the order a successful run passes through them.
///
/// `Refused` runs stop after `ContextChecking`; `Error` is reachable
/// from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ContextChecking,
    Reviewing,
    Aggregating,
    Publishing,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "fetching changes",
            Stage::ContextChecking => "checking context",
            Stage::Reviewing => "reviewing",
            Stage::Aggregating => "aggregating findings",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        write!(f, "{name}")
    }
}

fn log_stage(stage: Stage) {
    eprintln!("{} {stage}", "▸".cyan().bold());
}

/// Drives one pull request through the whole pipeline.
pub struct Orchestrator {
    host: Arc<dyn HostApi>,
    reviewer: Reviewer,
    config: Config,
}

impl Orchestrator {
    pub fn new(host: Arc<dyn HostApi>, reviewer: Reviewer, config: Config) -> Self {
        Self {
            host,
            reviewer,
            config,
        }
    }

    /// Run the pipeline for one PR number.
    ///
    /// Never returns an error: every failure mode maps to a status on the
    /// returned result, and the caller derives the exit code from that.
    pub async fn run(&self, pr: u64) -> ReviewResult {
        let started = Instant::now();

        log_stage(Stage::Init);
        let changes = match self.host.fetch_pr(pr).await {
            Ok(changes) => changes,
            Err(e) => {
                log_stage(Stage::Error);
                let result = ReviewResult::error(
                    format!("could not fetch PR #{pr}: {e}"),
                    started.elapsed().as_millis() as u64,
                );
                self.publish_error(pr, &result).await;
                self.write_artifacts(&result);
                return result;
            }
        };

        log_stage(Stage::ContextChecking);
        let check = gate::check(&changes, &self.config.gate);
        if !check.sufficient {
            let result = ReviewResult {
                status: ReviewStatus::Refused,
                changes: Some(changes),
                findings: Vec::new(),
                context: Some(check),
                duration_ms: started.elapsed().as_millis() as u64,
                completed_at: Utc::now(),
                error: None,
            };
            self.publish_refusal(pr, &result).await;
            self.write_artifacts(&result);
            return result;
        }

        log_stage(Stage::Reviewing);
        let findings = self.reviewer.review(&changes).await;

        log_stage(Stage::Aggregating);
        let status = if reviewer::should_fail(&findings, self.config.review.strict) {
            ReviewStatus::Failed
        } else {
            ReviewStatus::Passed
        };
        let result = ReviewResult {
            status,
            changes: Some(changes),
            findings,
            context: Some(check),
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
            error: None,
        };

        if self.config.review.publish {
            log_stage(Stage::Publishing);
            self.publish_verdict(pr, &result).await;
        }
        self.write_artifacts(&result);

        log_stage(Stage::Done);
        result
    }

    /// Best-effort comment for a run that died before reaching a verdict.
    async fn publish_error(&self, pr: u64, result: &ReviewResult) {
        if !self.config.review.publish {
            return;
        }
        let body = markdown::render(result, self.config.review.strict);
        if let Err(e) = self.host.post_comment(pr, &body).await {
            eprintln!("Warning: could not post error comment: {e}");
        }
    }

    /// Publish a refusal: an `error` commit status carrying the gate's
    /// reason, plus the refusal report as a conversation comment.
    async fn publish_refusal(&self, pr: u64, result: &ReviewResult) {
        if !self.config.review.publish {
            return;
        }
        if let Some(changes) = &result.changes {
            let reason = result
                .context
                .as_ref()
                .and_then(|check| check.reason.as_deref())
                .unwrap_or("Insufficient context for automated review");
            if let Err(e) = self
                .host
                .set_commit_status(&changes.head_sha, CommitState::Error, reason)
                .await
            {
                eprintln!("Warning: could not set commit status: {e}");
            }
        }
        let body = markdown::render(result, self.config.review.strict);
        if let Err(e) = self.host.post_comment(pr, &body).await {
            eprintln!("Warning: could not post refusal comment: {e}");
        }
    }

    /// Publish a pass/fail verdict: commit status, then a review with the
    /// report body and one inline comment per finding. A rejected review
    /// submission falls back to a plain conversation comment.
    async fn publish_verdict(&self, pr: u64, result: &ReviewResult) {
        let Some(changes) = &result.changes else {
            return;
        };

        let state = match result.status {
            ReviewStatus::Passed => CommitState::Success,
            _ => CommitState::Failure,
        };
        if let Err(e) = self
            .host
            .set_commit_status(&changes.head_sha, state, &status_description(result))
            .await
        {
            eprintln!("Warning: could not set commit status: {e}");
        }

        let body = markdown::render(result, self.config.review.strict);
        let comments: Vec<InlineComment> = result
            .findings
            .iter()
            .map(|finding| InlineComment {
                path: finding.violation.path.clone(),
                line: finding.violation.start_line,
                body: markdown::inline_comment(finding),
            })
            .collect();
        let event = match result.status {
            ReviewStatus::Failed => ReviewEvent::RequestChanges,
            _ => ReviewEvent::Comment,
        };

        if let Err(e) = self.host.submit_review(pr, &body, &comments, event).await {
            eprintln!("Warning: could not submit review: {e}; posting a plain comment instead");
            if let Err(e) = self.host.post_comment(pr, &body).await {
                eprintln!("Warning: could not post comment: {e}");
            }
        }
    }

    /// Write the report, summary, and (when fixes exist) patch files.
    fn write_artifacts(&self, result: &ReviewResult) {
        let report = markdown::render(result, self.config.review.strict);
        write_artifact(&self.config.artifacts.report_file, &report);

        let json = summary::render(result);
        write_artifact(&self.config.artifacts.summary_file, &json);

        let patch = fixes::patch_document(&result.findings);
        if !patch.is_empty() {
            write_artifact(&self.config.artifacts.patch_file, &patch);
        }
    }
}

fn write_artifact(path: &Path, content: &str) {
    if let Err(e) = fs::write(path, content) {
        eprintln!("Warning: could not write {}: {e}", path.display());
    }
}

/// One line for the commit status, within the host's length limit.
fn status_description(result: &ReviewResult) -> String {
    let counts = result.summary();
    match result.status {
        ReviewStatus::Passed if counts.total == 0 => "No findings".to_string(),
        ReviewStatus::Passed => format!(
            "{} advisory {}, none blocking",
            counts.total,
            if counts.total == 1 { "finding" } else { "findings" },
        ),
        _ => format!(
            "{} critical, {} {}",
            counts.critical,
            counts.warnings,
            if counts.warnings == 1 {
                "warning"
            } else {
                "warnings"
            },
        ),
    }
}

/// Map a result to the process exit code.
///
/// The status→code mapping itself is fixed (see `ReviewStatus::exit_code`);
/// the only configurable part is whether a refusal is tolerated (0) or
/// enforced (2).
pub fn exit_code(result: &ReviewResult, config: &Config) -> i32 {
    match result.status {
        ReviewStatus::Refused if !config.review.fail_on_insufficient_context => 0,
        status => status.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::config::ArtifactsConfig;
    use crate::host::HostError;
    use crate::models::{FileChange, FileStatus, PrChanges, Severity};
    use crate::providers::{CompletionProvider, ProviderError};
    use crate::rules::RuleSet;

    const CLEAN_REVIEW: &str = r#"{"findings": [], "confidence": 1.0, "reasoning": "No issues found."}"#;

    const CLEAN_PATCH: &str = "@@ -1,2 +1,3 @@\n def add(a, b):\n+    return a + b";

    const SECRET_PATCH: &str =
        "@@ -10,2 +10,3 @@\n def connect():\n+    password = \"hardcoded123\"\n     return db.connect()";

    struct MockProvider {
        response: String,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    #[derive(Default)]
    struct MockHost {
        pr: Option<PrChanges>,
        fail_fetch: bool,
        fail_submit: bool,
        comments: Mutex<Vec<String>>,
        statuses: Mutex<Vec<(String, CommitState, String)>>,
        reviews: Mutex<Vec<(String, Vec<InlineComment>, ReviewEvent)>>,
    }

    #[async_trait]
    impl HostApi for MockHost {
        async fn fetch_pr(&self, _number: u64) -> Result<PrChanges, HostError> {
            if self.fail_fetch {
                return Err(HostError::Request("connection refused".to_string()));
            }
            Ok(self.pr.clone().unwrap())
        }

        async fn post_comment(&self, _number: u64, body: &str) -> Result<(), HostError> {
            self.comments.lock().unwrap().push(body.to_string());
            Ok(())
        }

        async fn set_commit_status(
            &self,
            sha: &str,
            state: CommitState,
            description: &str,
        ) -> Result<(), HostError> {
            self.statuses
                .lock()
                .unwrap()
                .push((sha.to_string(), state, description.to_string()));
            Ok(())
        }

        async fn submit_review(
            &self,
            _number: u64,
            body: &str,
            comments: &[InlineComment],
            event: ReviewEvent,
        ) -> Result<(), HostError> {
            if self.fail_submit {
                return Err(HostError::Status {
                    status: 422,
                    body: "Unprocessable Entity".to_string(),
                });
            }
            self.reviews
                .lock()
                .unwrap()
                .push((body.to_string(), comments.to_vec(), event));
            Ok(())
        }
    }

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

    fn pr_with(files: Vec<FileChange>) -> PrChanges {
        PrChanges {
            number: 42,
            title: "Tighten retry loop".to_string(),
            body: String::new(),
            author: "dev".to_string(),
            base_ref: "main".to_string(),
            head_ref: "fix/retries".to_string(),
            base_sha: "aaa111".to_string(),
            head_sha: "bbb222".to_string(),
            additions: files.iter().map(|f| f.additions).sum(),
            deletions: files.iter().map(|f| f.deletions).sum(),
            changed_files: files.len(),
            files,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_config(dir: &Path) -> Config {
        Config {
            artifacts: ArtifactsConfig {
                report_file: dir.join("report.md"),
                summary_file: dir.join("summary.json"),
                patch_file: dir.join("fixes.patch"),
            },
            ..Config::default()
        }
    }

    fn orchestrator(host: Arc<MockHost>, provider: Arc<MockProvider>, config: Config) -> Orchestrator {
        let reviewer = Reviewer::new(RuleSet::builtin(), provider);
        Orchestrator::new(host, reviewer, config)
    }

    #[tokio::test]
    async fn clean_pr_passes_and_publishes_success() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/math.py", CLEAN_PATCH)])),
            ..MockHost::default()
        });
        let provider = MockProvider::new(CLEAN_REVIEW);
        let config = test_config(dir.path());

        let result = orchestrator(host.clone(), provider, config.clone()).run(42).await;

        assert_eq!(result.status, ReviewStatus::Passed);
        assert_eq!(exit_code(&result, &config), 0);

        let statuses = host.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].0, "bbb222");
        assert_eq!(statuses[0].1, CommitState::Success);
        assert_eq!(statuses[0].2, "No findings");

        let reviews = host.reviews.lock().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].2, ReviewEvent::Comment);
        assert!(reviews[0].1.is_empty());
    }

    #[tokio::test]
    async fn oversized_pr_is_refused_without_calling_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<FileChange> = (0..60)
            .map(|i| file(&format!("src/f{i}.py"), CLEAN_PATCH))
            .collect();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(files)),
            ..MockHost::default()
        });
        let provider = MockProvider::new(CLEAN_REVIEW);
        let config = test_config(dir.path());

        let result = orchestrator(host.clone(), provider.clone(), config.clone()).run(42).await;

        assert_eq!(result.status, ReviewStatus::Refused);
        assert_eq!(exit_code(&result, &config), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let statuses = host.statuses.lock().unwrap();
        assert_eq!(statuses[0].1, CommitState::Error);
        assert!(statuses[0].2.contains("Too many files"));

        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("Refused"));
    }

    #[tokio::test]
    async fn tolerated_refusal_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<FileChange> = (0..60)
            .map(|i| file(&format!("src/f{i}.py"), CLEAN_PATCH))
            .collect();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(files)),
            ..MockHost::default()
        });
        let mut config = test_config(dir.path());
        config.review.fail_on_insufficient_context = false;

        let result = orchestrator(host, MockProvider::new(CLEAN_REVIEW), config.clone())
            .run(42)
            .await;

        assert_eq!(result.status, ReviewStatus::Refused);
        assert_eq!(exit_code(&result, &config), 0);
    }

    #[tokio::test]
    async fn hardcoded_secret_fails_and_requests_changes() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/db.py", SECRET_PATCH)])),
            ..MockHost::default()
        });
        let config = test_config(dir.path());

        let result = orchestrator(host.clone(), MockProvider::new(CLEAN_REVIEW), config.clone())
            .run(42)
            .await;

        assert_eq!(result.status, ReviewStatus::Failed);
        assert_eq!(exit_code(&result, &config), 1);
        assert_eq!(result.findings[0].rule_id, "SEC002");
        assert_eq!(result.findings[0].severity, Severity::Critical);

        let statuses = host.statuses.lock().unwrap();
        assert_eq!(statuses[0].1, CommitState::Failure);

        let reviews = host.reviews.lock().unwrap();
        assert_eq!(reviews[0].2, ReviewEvent::RequestChanges);
        assert_eq!(reviews[0].1.len(), 1);
        assert_eq!(reviews[0].1[0].path, "src/db.py");
        assert_eq!(reviews[0].1[0].line, 11);
    }

    #[tokio::test]
    async fn fetch_failure_produces_error_result_and_comment() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            fail_fetch: true,
            ..MockHost::default()
        });
        let config = test_config(dir.path());

        let result = orchestrator(host.clone(), MockProvider::new(CLEAN_REVIEW), config.clone())
            .run(42)
            .await;

        assert_eq!(result.status, ReviewStatus::Error);
        assert_eq!(exit_code(&result, &config), 3);
        assert!(result.error.as_deref().unwrap().contains("connection refused"));

        // Best-effort error comment, no status (no sha to attach it to).
        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(host.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_review_submission_falls_back_to_comment() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/db.py", SECRET_PATCH)])),
            fail_submit: true,
            ..MockHost::default()
        });
        let config = test_config(dir.path());

        let result = orchestrator(host.clone(), MockProvider::new(CLEAN_REVIEW), config.clone())
            .run(42)
            .await;

        // The verdict is unchanged; the report lands as a plain comment.
        assert_eq!(result.status, ReviewStatus::Failed);
        let comments = host.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("Hardcoded credential"));
    }

    #[tokio::test]
    async fn no_publish_posts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/db.py", SECRET_PATCH)])),
            ..MockHost::default()
        });
        let mut config = test_config(dir.path());
        config.review.publish = false;

        let result = orchestrator(host.clone(), MockProvider::new(CLEAN_REVIEW), config.clone())
            .run(42)
            .await;

        assert_eq!(result.status, ReviewStatus::Failed);
        assert!(host.comments.lock().unwrap().is_empty());
        assert!(host.statuses.lock().unwrap().is_empty());
        assert!(host.reviews.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn artifacts_are_written_on_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/db.py", SECRET_PATCH)])),
            ..MockHost::default()
        });
        let config = test_config(dir.path());

        orchestrator(host, MockProvider::new(CLEAN_REVIEW), config.clone()).run(42).await;

        let report = fs::read_to_string(&config.artifacts.report_file).unwrap();
        assert!(report.contains("Hardcoded credential"));

        let summary_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config.artifacts.summary_file).unwrap())
                .unwrap();
        assert_eq!(summary_json["status"], "failed");
        assert_eq!(summary_json["exit_code"], 1);

        // SEC002 has a mechanical rewrite, so a patch document exists.
        let patch = fs::read_to_string(&config.artifacts.patch_file).unwrap();
        assert!(patch.contains("--- a/src/db.py"));
    }

    #[tokio::test]
    async fn clean_run_writes_no_patch_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            pr: Some(pr_with(vec![file("src/math.py", CLEAN_PATCH)])),
            ..MockHost::default()
        });
        let config = test_config(dir.path());

        orchestrator(host, MockProvider::new(CLEAN_REVIEW), config.clone()).run(42).await;

        assert!(config.artifacts.report_file.exists());
        assert!(config.artifacts.summary_file.exists());
        assert!(!config.artifacts.patch_file.exists());
    }

    #[test]
    fn status_description_counts() {
        let passed = ReviewResult {
            status: ReviewStatus::Passed,
            changes: None,
            findings: Vec::new(),
            context: None,
            duration_ms: 0,
            completed_at: Utc::now(),
            error: None,
        };
        assert_eq!(status_description(&passed), "No findings");
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::Init.to_string(), "fetching changes");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
