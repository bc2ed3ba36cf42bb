//! Host forge API access.
//!
//! The gate talks to the host for exactly four things: fetching the PR
//! snapshot, posting comments, setting commit statuses, and submitting
//! reviews. The trait stays that small so publishing can be mocked in
//! tests and other forges can slot in behind it.

pub mod github;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PrChanges;

/// Errors from host API calls.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("missing environment variable: {0}")]
    MissingEnv(String),

    #[error("API request failed: {0}")]
    Request(String),

    #[error("API request failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode API response: {0}")]
    Decode(String),
}

/// Commit status states understood by the host.
///
/// `Failure` means the review ran and rejected the change; `Error`
/// means the review could not be performed at all. Branch protection
/// treats both as blocking, but the distinction matters to people
/// reading the checks tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Success,
    Failure,
    Error,
    Pending,
}

impl CommitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
            CommitState::Pending => "pending",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review event submitted alongside inline comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Comment,
    RequestChanges,
    Approve,
}

impl ReviewEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewEvent::Comment => "COMMENT",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
            ReviewEvent::Approve => "APPROVE",
        }
    }
}

/// One inline comment anchored to a line of the new file version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// The host operations the gate needs.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Fetch the PR snapshot including per-file patches.
    async fn fetch_pr(&self, number: u64) -> Result<PrChanges, HostError>;

    /// Post a plain comment on the PR conversation.
    async fn post_comment(&self, number: u64, body: &str) -> Result<(), HostError>;

    /// Set the commit status that branch protection rules key on.
    async fn set_commit_status(
        &self,
        sha: &str,
        state: CommitState,
        description: &str,
    ) -> Result<(), HostError>;

    /// Submit a review with inline comments.
    async fn submit_review(
        &self,
        number: u64,
        body: &str,
        comments: &[InlineComment],
        event: ReviewEvent,
    ) -> Result<(), HostError>;
}
