//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! artifact filenames, and API defaults so a rename only requires
//! changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "revgate";

/// Crate version, embedded at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple (exposed by build.rs).
pub const TARGET: &str = env!("TARGET");

/// User-Agent header sent on every outbound HTTP request.
pub const USER_AGENT: &str = concat!("revgate/", env!("CARGO_PKG_VERSION"));

/// Local config filename (e.g. `.revgate.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".revgate.toml";

/// Directory name under `~/.config/` for the global config file.
pub const CONFIG_DIR: &str = "revgate";

/// Default base URL for the host REST API.
pub const DEFAULT_HOST_API_URL: &str = "https://api.github.com";

/// Context string attached to commit statuses.
pub const STATUS_CONTEXT: &str = "revgate/review";

/// Hard cap the host API enforces on commit status descriptions.
pub const STATUS_DESCRIPTION_LIMIT: usize = 140;

/// Disclosure line appended to published reviews and comments.
pub const AI_DISCLOSURE: &str =
    "AI-assisted review by revgate. Findings may be imperfect; verify before applying fixes.";


// ── Artifact filenames (written to the working directory) ───────────

pub const REPORT_FILENAME: &str = "revgate-report.md";
pub const SUMMARY_FILENAME: &str = "revgate-summary.json";
pub const PATCH_FILENAME: &str = "revgate-fixes.patch";


// ── Environment variable names ──────────────────────────────────────

pub const ENV_PR_NUMBER: &str = "REVGATE_PR_NUMBER";
pub const ENV_REPOSITORY: &str = "REVGATE_REPOSITORY";
pub const ENV_HOST_TOKEN: &str = "REVGATE_HOST_TOKEN";
pub const ENV_HOST_API_URL: &str = "REVGATE_HOST_API_URL";
pub const ENV_PROVIDER: &str = "REVGATE_PROVIDER";
pub const ENV_MODEL: &str = "REVGATE_MODEL";
pub const ENV_API_KEY: &str = "REVGATE_API_KEY";
pub const ENV_BASE_URL: &str = "REVGATE_BASE_URL";
pub const ENV_STRICT: &str = "REVGATE_STRICT";
pub const ENV_FAIL_ON_INSUFFICIENT_CONTEXT: &str = "REVGATE_FAIL_ON_INSUFFICIENT_CONTEXT";
pub const ENV_MAX_FILES: &str = "REVGATE_MAX_FILES";
pub const ENV_MAX_LINES: &str = "REVGATE_MAX_LINES";

// Fallbacks provided by GitHub Actions runners.
pub const ENV_GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
