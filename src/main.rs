//! revgate — AI code review gate for CI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages. The process
//! exit code is the pipeline contract: 0 passed, 1 failed, 2 refused,
//! 3 system error — so every failure path here ends in 3, never in a
//! clap-style usage code.

mod cli;

use revgate::config;
use revgate::constants;
use revgate::env;
use revgate::host;
use revgate::orchestrator;
use revgate::providers;
use revgate::report;
use revgate::reviewer;
use revgate::rules;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use strum::IntoEnumIterator;

use cli::args::{Cli, Command, ReviewArgs};
use config::Config;
use env::Env;
use host::github::GithubHost;
use providers::rig::RigProvider;
use providers::CompletionProvider;
use reviewer::Reviewer;
use rules::{RuleKind, RuleSet};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders help and version through this path too; only
            // genuine usage errors take the system exit code.
            let _ = err.print();
            process::exit(if err.use_stderr() { 3 } else { 0 });
        }
    };

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            3
        }
    };
    process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Review(args) => run_review(*args).await,
        Command::Rules => run_rules(),
        Command::Version => run_version(),
    }
}

/// Run the review pipeline for one PR and map the outcome to an exit code.
async fn run_review(args: ReviewArgs) -> Result<i32> {
    let env = Env::real();

    let cwd = std::env::current_dir().context("could not determine working directory")?;
    let mut config =
        Config::load(Some(&cwd), &env).context("failed to load configuration")?;
    cli::apply_overrides(&mut config, &args);

    let pr = args.pr.with_context(|| {
        format!(
            "no pull request number: pass --pr or set {}",
            constants::ENV_PR_NUMBER
        )
    })?;

    let host = GithubHost::from_env(
        &env,
        args.repository.as_deref(),
        config.host.api_url.as_deref(),
    )
    .context("host not configured")?;

    let provider: Arc<dyn CompletionProvider> = Arc::new(
        RigProvider::new(config.provider.clone()).map_err(|e| anyhow::anyhow!("{e}"))?,
    );

    let rules = RuleSet::builtin().without(&config.review.disabled_rules);
    let reviewer = Reviewer::new(rules, provider);
    let orchestrator =
        orchestrator::Orchestrator::new(Arc::new(host), reviewer, config.clone());

    let result = orchestrator.run(pr).await;

    // The report also goes to stdout so CI logs carry the verdict even
    // when nobody downloads the artifacts.
    print!("{}", report::markdown::render(&result, config.review.strict));

    Ok(orchestrator::exit_code(&result, &config))
}

/// List the built-in rules with their explanations.
fn run_rules() -> Result<i32> {
    use colored::Colorize;

    for kind in RuleKind::iter() {
        let rule = kind.explain();
        println!(
            "  {}  {}  {}",
            kind.id().bold(),
            rule.title,
            format!("({} · {})", kind.category(), kind.severity()).dimmed(),
        );
        println!("          {}", rule.description.dimmed());
        if let Some(url) = rule.learn_more {
            println!("          {}  {}", "docs:".cyan(), url);
        }
    }

    Ok(0)
}

/// Print version and build information.
fn run_version() -> Result<i32> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}  {}", "target:".dimmed(), constants::TARGET);
    Ok(0)
}
