//! Batch command implementation.
//!
//! Scrapes a list of URLs read from a file, or from stdin with `-`.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sieve_core::CoreError;
use tracing::info;

use super::{build_orchestrator, cancel_on_interrupt, parse_targets};
use crate::output::{Printer, StdoutSink};
use crate::{Cli, ExitCode};

/// Arguments for `batch`.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// File with one URL per line, or `-` for stdin.
    #[arg(long, short = 'i')]
    pub file: PathBuf,

    /// Maximum targets in flight (defaults to the job's concurrency).
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,
}

/// Run the batch command.
pub async fn run(args: &BatchArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;

    let listing = if args.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading URLs from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("reading {}", args.file.display()))?
    };

    let urls = parse_url_list(&listing);
    if urls.is_empty() {
        return Err(CoreError::config("no URLs in the batch file").into());
    }
    let targets = parse_targets(&urls)?;

    let limit = args.concurrency.unwrap_or(config.concurrency);
    if limit == 0 {
        return Err(CoreError::config("concurrency must be at least 1").into());
    }

    let orchestrator = build_orchestrator(&config)?;
    cancel_on_interrupt(&orchestrator);
    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());

    info!(targets = targets.len(), concurrency = limit, "Scraping batch");
    let outcomes = orchestrator
        .scrape_many_into(targets, limit, &StdoutSink::new(&printer))
        .await?;
    let failures = outcomes.iter().filter(|outcome| outcome.is_err()).count();

    if !cli.quiet {
        printer.emit_err(&printer.render_stats(&orchestrator.stats())?)?;
    }

    Ok(if failures == 0 {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

/// Reads one URL per line. Blank lines and `#` comments are skipped.
fn parse_url_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
