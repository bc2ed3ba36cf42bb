//! GitHub REST API client.
//!
//! Works against github.com by default and against GitHub Enterprise or
//! API-compatible forges via a custom base URL. Only the endpoints the
//! gate needs are implemented.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{CommitState, HostApi, HostError, InlineComment, ReviewEvent};
use crate::constants::{
    DEFAULT_HOST_API_URL, ENV_GITHUB_API_URL, ENV_GITHUB_REPOSITORY, ENV_GITHUB_TOKEN,
    ENV_HOST_API_URL, ENV_HOST_TOKEN, ENV_REPOSITORY, STATUS_CONTEXT, STATUS_DESCRIPTION_LIMIT,
    USER_AGENT,
};
use crate::env::Env;
use crate::models::{FileChange, FileStatus, PrChanges};

/// Files are fetched in pages of this size (the GitHub maximum).
const FILES_PER_PAGE: usize = 100;

/// GitHub REST client scoped to a single `owner/repo`.
#[derive(Debug)]
pub struct GithubHost {
    http: reqwest::Client,
    api_url: String,
    repo: String,
    token: String,
}

impl GithubHost {
    pub fn new(api_url: &str, repo: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        }
    }

    /// Build a client from CI environment variables.
    ///
    /// `repo` overrides the environment lookup when given (the CLI flag).
    /// Dedicated `REVGATE_*` variables win over the ones GitHub Actions
    /// provides, so a workflow can review with a different token or
    /// repository than the one it runs in. For the API URL the order is
    /// environment, then the config file value, then github.com.
    pub fn from_env(
        env: &Env,
        repo: Option<&str>,
        config_api_url: Option<&str>,
    ) -> Result<Self, HostError> {
        let repo = match repo {
            Some(repo) => repo.to_string(),
            None => env
                .var_or(ENV_REPOSITORY, ENV_GITHUB_REPOSITORY)
                .map_err(|_| HostError::MissingEnv(ENV_REPOSITORY.to_string()))?,
        };
        let token = env
            .var_or(ENV_HOST_TOKEN, ENV_GITHUB_TOKEN)
            .map_err(|_| HostError::MissingEnv(ENV_HOST_TOKEN.to_string()))?;
        let api_url = env
            .var_or(ENV_HOST_API_URL, ENV_GITHUB_API_URL)
            .ok()
            .or_else(|| config_api_url.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_HOST_API_URL.to_string());
        Ok(Self::new(&api_url, &repo, &token))
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, HostError> {
        let url = format!("{}/{path}", self.api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| HostError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(HostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    async fn post_json(&self, path: &str, payload: &serde_json::Value) -> Result<(), HostError> {
        let url = format!("{}/{path}", self.api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await
            .map_err(|e| HostError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(HostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl HostApi for GithubHost {
    async fn fetch_pr(&self, number: u64) -> Result<PrChanges, HostError> {
        let pull: PullWire = self
            .get_json(&format!("repos/{}/pulls/{number}", self.repo))
            .await?;

        let mut files: Vec<FileWire> = Vec::new();
        for page in 1usize.. {
            let batch: Vec<FileWire> = self
                .get_json(&format!(
                    "repos/{}/pulls/{number}/files?per_page={FILES_PER_PAGE}&page={page}",
                    self.repo
                ))
                .await?;
            let done = batch.len() < FILES_PER_PAGE;
            files.extend(batch);
            if done {
                break;
            }
        }

        Ok(pull.into_changes(files))
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<(), HostError> {
        let payload = json!({ "body": body });
        self.post_json(
            &format!("repos/{}/issues/{number}/comments", self.repo),
            &payload,
        )
        .await
    }

    async fn set_commit_status(
        &self,
        sha: &str,
        state: CommitState,
        description: &str,
    ) -> Result<(), HostError> {
        let payload = json!({
            "state": state.as_str(),
            "context": STATUS_CONTEXT,
            "description": truncate_description(description),
        });
        self.post_json(&format!("repos/{}/statuses/{sha}", self.repo), &payload)
            .await
    }

    async fn submit_review(
        &self,
        number: u64,
        body: &str,
        comments: &[InlineComment],
        event: ReviewEvent,
    ) -> Result<(), HostError> {
        let comment_payloads: Vec<serde_json::Value> = comments
            .iter()
            .map(|c| {
                json!({
                    "path": c.path,
                    "line": c.line,
                    "side": "RIGHT",
                    "body": c.body,
                })
            })
            .collect();

        let payload = json!({
            "body": body,
            "event": event.as_str(),
            "comments": comment_payloads,
        });
        self.post_json(
            &format!("repos/{}/pulls/{number}/reviews", self.repo),
            &payload,
        )
        .await
    }
}

/// Truncate a status description to the host's limit, on a char boundary.
fn truncate_description(description: &str) -> String {
    if description.chars().count() <= STATUS_DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let cut: String = description
        .chars()
        .take(STATUS_DESCRIPTION_LIMIT - 3)
        .collect();
    format!("{cut}...")
}

#[derive(Debug, Deserialize)]
struct PullWire {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    user: UserWire,
    base: RefWire,
    head: RefWire,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    additions: usize,
    deletions: usize,
    changed_files: usize,
}

#[derive(Debug, Deserialize)]
struct UserWire {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RefWire {
    #[serde(rename = "ref")]
    name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct FileWire {
    filename: String,
    status: FileStatus,
    additions: usize,
    deletions: usize,
    changes: usize,
    #[serde(default)]
    patch: Option<String>,
    #[serde(default)]
    previous_filename: Option<String>,
}

impl PullWire {
    fn into_changes(self, files: Vec<FileWire>) -> PrChanges {
        PrChanges {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            author: self.user.login,
            base_ref: self.base.name,
            head_ref: self.head.name,
            base_sha: self.base.sha,
            head_sha: self.head.sha,
            files: files.into_iter().map(FileWire::into_change).collect(),
            additions: self.additions,
            deletions: self.deletions,
            changed_files: self.changed_files,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl FileWire {
    fn into_change(self) -> FileChange {
        FileChange {
            path: self.filename,
            status: self.status,
            additions: self.additions,
            deletions: self.deletions,
            changes: self.changes,
            patch: self.patch,
            previous_path: self.previous_filename,
        }
    }
}
