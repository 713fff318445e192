//! Scrape command implementation.

use anyhow::Result;
use clap::Args;
use sieve_core::CoreError;
use tracing::info;

use super::{build_orchestrator, cancel_on_interrupt, parse_targets};
use crate::output::{Printer, StdoutSink};
use crate::{Cli, ExitCode};

/// Arguments for `scrape`.
#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// URLs to scrape in addition to the job's targets.
    pub urls: Vec<String>,

    /// Maximum targets in flight (defaults to the job's concurrency).
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Follow pagination from every target.
    #[arg(long)]
    pub paginate: bool,

    /// Ignore the job's targets and scrape only the URLs given.
    #[arg(long)]
    pub only_urls: bool,
}

/// Run the scrape command.
pub async fn run(args: &ScrapeArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;

    let job_targets = if args.only_urls { &[][..] } else { &config.targets[..] };
    let targets = parse_targets(job_targets.iter().chain(&args.urls))?;
    if targets.is_empty() {
        return Err(CoreError::config("no targets: list them in the job file or pass URLs").into());
    }

    let limit = args.concurrency.unwrap_or(config.concurrency);
    if limit == 0 {
        return Err(CoreError::config("concurrency must be at least 1").into());
    }

    let orchestrator = build_orchestrator(&config)?;
    cancel_on_interrupt(&orchestrator);
    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());

    info!(targets = targets.len(), concurrency = limit, "Scraping");

    let failures = if args.paginate || config.pagination.enabled {
        let runs = orchestrator.scrape_paginated_many(targets, limit).await;
        for run in &runs {
            printer.emit(&printer.render_run(run)?)?;
        }
        runs.iter().filter(|run| run.failure.is_some()).count()
    } else {
        let outcomes = orchestrator
            .scrape_many_into(targets, limit, &StdoutSink::new(&printer))
            .await?;
        outcomes.iter().filter(|outcome| outcome.is_err()).count()
    };

    if !cli.quiet {
        printer.emit_err(&printer.render_stats(&orchestrator.stats())?)?;
    }

    Ok(if failures == 0 {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}
