//! Pull request change types: per-file changes and the PR snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Change status of a single file within a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

/// Custom deserializer for FileStatus that accepts host API variations.
///
/// GitHub reports `added`, `removed`, `modified`, `renamed`, but also
/// `copied`, `changed`, and `unchanged`. Anything unrecognised is treated
/// as a modification rather than failing the whole fetch.
impl<'de> Deserialize<'de> for FileStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "added" | "new" | "created" => Ok(FileStatus::Added),
            "removed" | "deleted" => Ok(FileStatus::Removed),
            "renamed" | "moved" => Ok(FileStatus::Renamed),
            _ => Ok(FileStatus::Modified),
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single changed file within a pull request.
///
/// Immutable snapshot taken at fetch time; nothing downstream mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    /// The kind of change.
    pub status: FileStatus,
    /// Lines added in this file.
    pub additions: usize,
    /// Lines deleted in this file.
    pub deletions: usize,
    /// Total changed lines (additions + deletions as reported by the host).
    pub changes: usize,
    /// Unified diff text for this file. `None` when the host omitted it
    /// (binary content or a diff too large to inline).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// Previous path for renames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl FileChange {
    /// Whether this file should be fed to the reviewer at all.
    ///
    /// Removed files have nothing to review; files without a patch
    /// cannot be reviewed line-by-line.
    pub fn reviewable(&self) -> bool {
        self.status != FileStatus::Removed && self.patch.is_some()
    }
}

/// Immutable snapshot of a pull request for one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrChanges {
    /// PR number on the host.
    pub number: u64,
    /// PR title.
    pub title: String,
    /// PR description body (may be empty).
    #[serde(default)]
    pub body: String,
    /// Login of the PR author.
    pub author: String,
    /// Name of the base branch.
    pub base_ref: String,
    /// Name of the head branch.
    pub head_ref: String,
    /// Commit sha the PR is based on.
    pub base_sha: String,
    /// Head commit sha — the commit statuses attach to this.
    pub head_sha: String,
    /// Changed files in the order the host returned them.
    pub files: Vec<FileChange>,
    /// Aggregate additions as reported by the host.
    pub additions: usize,
    /// Aggregate deletions as reported by the host.
    pub deletions: usize,
    /// File count as reported by the host.
    pub changed_files: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrChanges {
    /// Number of files in the fetched change list.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total changed lines summed over the fetched change list.
    pub fn total_changes(&self) -> usize {
        self.files.iter().map(|f| f.changes).sum()
    }

    /// Total added lines summed over the fetched change list.
    pub fn total_additions(&self) -> usize {
        self.files.iter().map(|f| f.additions).sum()
    }

    /// Total deleted lines summed over the fetched change list.
    pub fn total_deletions(&self) -> usize {
        self.files.iter().map(|f| f.deletions).sum()
    }
}
