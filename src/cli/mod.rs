//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use revgate::config::Config;

use args::ReviewArgs;

/// One-line about string with ANSI styling for clap help output.
/// Bold "revgate", dimmed rest. (Static — used for --help only.)
pub const ABOUT_STYLED: &str =
    "\x1b[1mrevgate\x1b[0m \x1b[2m· AI code review gate for CI pipelines.\x1b[0m";

/// Fold CLI flags into the loaded configuration.
///
/// Flags are the last layer, on top of defaults, config files, and
/// environment variables. Boolean flags only tighten or loosen when
/// actually passed; absent flags leave the configured value alone.
pub fn apply_overrides(config: &mut Config, args: &ReviewArgs) {
    if args.strict {
        config.review.strict = true;
    }
    if args.no_fail_on_refusal {
        config.review.fail_on_insufficient_context = false;
    }
    if args.no_publish {
        config.review.publish = false;
    }
    if let Some(max_files) = args.max_files {
        config.gate.max_files = max_files;
    }
    if let Some(max_lines) = args.max_lines {
        config.gate.max_lines = max_lines;
    }
    if let Some(path) = &args.report_file {
        config.artifacts.report_file = path.clone();
    }
    if let Some(path) = &args.summary_file {
        config.artifacts.summary_file = path.clone();
    }
    if let Some(path) = &args.patch_file {
        config.artifacts.patch_file = path.clone();
    }
}
