//! Context sufficiency gate.
//!
//! Before any review work starts, the gate inspects the shape of a pull
//! request and decides whether an automated review would produce a
//! trustworthy verdict. Oversized, scattered, or truncated PRs are
//! refused outright: a refusal is an explicit "cannot judge", which CI
//! distinguishes from pass and fail via the exit-code contract.
//!
//! All checks here are pure functions of the fetched PR snapshot. The
//! first failed check wins and becomes the single reported reason.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;

use crate::models::{FileChange, FileStatus, PrChanges};

/// Tunable limits for the gate. Defaults are deliberately permissive;
/// teams tighten them per repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateThresholds {
    /// Maximum number of changed files.
    pub max_files: usize,
    /// Maximum total changed lines across all files.
    pub max_lines: usize,
    /// Minimum directory cohesion score, in [0, 1].
    pub min_cohesion: f64,
    /// Maximum structural complexity score.
    pub max_complexity: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        GateThresholds {
            max_files: 50,
            max_lines: 5000,
            min_cohesion: 0.3,
            max_complexity: 100.0,
        }
    }
}

/// Verdict of the context gate for one PR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCheck {
    /// Whether the PR is reviewable.
    pub sufficient: bool,
    /// Why the gate refused. `None` when sufficient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// What the author can do about it. `None` when sufficient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Computed metrics, recorded for observability on every verdict.
    #[serde(default)]
    pub details: IndexMap<String, Value>,
}

impl ContextCheck {
    fn sufficient(details: IndexMap<String, Value>) -> Self {
        ContextCheck {
            sufficient: true,
            reason: None,
            suggestion: None,
            details,
        }
    }

    fn insufficient(
        reason: impl Into<String>,
        suggestion: impl Into<String>,
        details: IndexMap<String, Value>,
    ) -> Self {
        ContextCheck {
            sufficient: false,
            reason: Some(reason.into()),
            suggestion: Some(suggestion.into()),
            details,
        }
    }
}

/// Run all sufficiency checks against a PR snapshot.
///
/// Cheap structural checks run first; the first violated threshold
/// determines the reported reason. Reasons are never aggregated, a
/// single clear message beats a complete list.
pub fn check(changes: &PrChanges, thresholds: &GateThresholds) -> ContextCheck {
    let file_count = changes.file_count();
    let total_changes = changes.total_changes();

    if file_count > thresholds.max_files {
        return ContextCheck::insufficient(
            format!(
                "Too many files changed ({file_count} > {})",
                thresholds.max_files
            ),
            format!(
                "Split this PR into smaller, focused changes of at most {} files each.",
                thresholds.max_files
            ),
            IndexMap::from([("file_count".to_string(), json!(file_count))]),
        );
    }

    if total_changes > thresholds.max_lines {
        return ContextCheck::insufficient(
            format!(
                "Too many changed lines ({total_changes} > {})",
                thresholds.max_lines
            ),
            format!(
                "Split this PR so each part changes fewer than {} lines.",
                thresholds.max_lines
            ),
            IndexMap::from([("total_changes".to_string(), json!(total_changes))]),
        );
    }

    if let Some(file) = changes.files.iter().find(|f| is_binary_or_generated(&f.path)) {
        return ContextCheck::insufficient(
            "Binary or generated files without source context",
            "Exclude build artifacts, binaries, and lockfiles from the PR, \
             or review them manually.",
            IndexMap::from([("offending_file".to_string(), json!(file.path))]),
        );
    }

    // Hosts omit the patch for oversized diffs. A file that claims changes
    // but carries no patch cannot be reviewed line-by-line.
    if let Some(file) = changes
        .files
        .iter()
        .find(|f| f.status != FileStatus::Removed && f.changes > 0 && f.patch.is_none())
    {
        return ContextCheck::insufficient(
            "Incomplete diff data",
            "The host omitted the diff for some files, likely because it is \
             too large. Review those files manually.",
            IndexMap::from([("offending_file".to_string(), json!(file.path))]),
        );
    }

    let cohesion = cohesion_score(&changes.files);
    if cohesion < thresholds.min_cohesion {
        return ContextCheck::insufficient(
            "Changes too scattered across the repository",
            "Group related changes together and submit unrelated changes \
             as separate PRs.",
            IndexMap::from([("cohesion".to_string(), json!(cohesion))]),
        );
    }

    let complexity = complexity_score(&changes.files);
    if complexity > thresholds.max_complexity {
        return ContextCheck::insufficient(
            "Too complex for automated review",
            "Break this change into smaller steps that can be reviewed \
             independently.",
            IndexMap::from([("complexity".to_string(), json!(complexity))]),
        );
    }

    ContextCheck::sufficient(IndexMap::from([
        ("file_count".to_string(), json!(file_count)),
        ("total_changes".to_string(), json!(total_changes)),
        ("cohesion".to_string(), json!(cohesion)),
        ("complexity".to_string(), json!(complexity)),
    ]))
}

/// Directory cohesion of a change set, in [0, 1].
///
/// `1 − (unique_directories − 1) / file_count`. A PR touching one
/// directory scores 1.0; one file per directory approaches 0. An empty
/// change set scores 1.0 (nothing to scatter).
pub fn cohesion_score(files: &[FileChange]) -> f64 {
    if files.is_empty() {
        return 1.0;
    }

    let dirs: HashSet<&str> = files
        .iter()
        .map(|f| {
            Path::new(&f.path)
                .parent()
                .and_then(|p| p.to_str())
                .unwrap_or("")
        })
        .collect();

    let score = 1.0 - (dirs.len() as f64 - 1.0) / files.len() as f64;
    score.clamp(0.0, 1.0)
}

/// Structural complexity of a change set.
///
/// `2·files + lines/100 + 20·min(add_ratio, del_ratio) + 5·extensions`.
/// The ratio term penalizes dense mixes of additions and deletions,
/// which are harder to reason about than pure adds or pure deletes.
pub fn complexity_score(files: &[FileChange]) -> f64 {
    let file_count = files.len();
    let total_changes: usize = files.iter().map(|f| f.changes).sum();

    let mut score = 2.0 * file_count as f64 + total_changes as f64 / 100.0;

    if total_changes > 0 {
        let additions: usize = files.iter().map(|f| f.additions).sum();
        let deletions: usize = files.iter().map(|f| f.deletions).sum();
        let add_ratio = additions as f64 / total_changes as f64;
        let del_ratio = deletions as f64 / total_changes as f64;
        score += 20.0 * add_ratio.min(del_ratio);
    }

    let extensions: HashSet<String> = files
        .iter()
        .filter_map(|f| {
            Path::new(&f.path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
        })
        .collect();
    score += 5.0 * extensions.len() as f64;

    score
}

/// Extensions that carry no reviewable source text.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "tar", "gz", "tgz", "bz2",
    "xz", "7z", "rar", "exe", "dll", "so", "dylib", "bin", "o", "a", "class", "jar", "war", "pyc",
    "wasm", "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "avi", "mov", "sqlite", "db",
];

/// Directory names that mark generated or vendored trees.
const GENERATED_DIRS: &[&str] = &["dist", "build", "node_modules", "vendor"];

/// Exact filenames of dependency lockfiles.
const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
];

/// Heuristic for files that cannot be meaningfully reviewed as text.
pub fn is_binary_or_generated(path: &str) -> bool {
    let p = Path::new(path);

    if let Some(ext) = p.extension().and_then(|e| e.to_str()) {
        if BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }

    let file_name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if LOCKFILES.contains(&file_name) || file_name.contains(".min.") {
        return true;
    }

    // Any parent segment named dist/build/node_modules/vendor
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop(); // the filename itself
    segments.iter().any(|s| GENERATED_DIRS.contains(s))
}
