//! Clap argument types for the revgate binary.

use clap::Parser;
use std::path::PathBuf;

use revgate::constants;

/// CI code review gate.
#[derive(Parser, Debug)]
#[command(
    name = constants::APP_NAME,
    version = constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review a pull request and gate the pipeline on the verdict.
    Review(Box<ReviewArgs>),

    /// List the built-in rules with their explanations.
    Rules,

    /// Print version and build information.
    Version,
}

/// Arguments for the `review` subcommand.
///
/// Every flag that maps onto a config field overrides it; the layering
/// is defaults, then config files, then environment, then these flags.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Pull request number to review.
    #[arg(long, env = constants::ENV_PR_NUMBER)]
    pub pr: Option<u64>,

    /// Repository in owner/repo form (default: detected from the CI environment).
    #[arg(long, env = constants::ENV_REPOSITORY)]
    pub repository: Option<String>,

    /// Fail the gate on warnings, not just on critical findings.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Exit 0 instead of 2 when the context gate refuses to review.
    #[arg(long, default_value_t = false)]
    pub no_fail_on_refusal: bool,

    /// Refuse PRs touching more than this many files.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Refuse PRs changing more than this many lines.
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Where to write the markdown report.
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Where to write the machine-readable JSON summary.
    #[arg(long)]
    pub summary_file: Option<PathBuf>,

    /// Where to write the consolidated suggested-fix patch.
    #[arg(long)]
    pub patch_file: Option<PathBuf>,

    /// Render the report and artifacts without posting anything to the host.
    #[arg(long, default_value_t = false)]
    pub no_publish: bool,
}
