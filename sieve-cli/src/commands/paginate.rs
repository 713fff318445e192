//! Paginate command implementation.

use anyhow::Result;
use clap::Args;
use sieve_fetch::FetchTarget;

use super::{build_orchestrator, cancel_on_interrupt};
use crate::output::Printer;
use crate::{Cli, ExitCode};

/// Arguments for `paginate`.
#[derive(Debug, Args)]
pub struct PaginateArgs {
    /// First page of the listing.
    pub url: String,

    /// Stop after this many pages (overrides the job file).
    #[arg(long)]
    pub max_pages: Option<u32>,
}

/// Run the paginate command.
///
/// Pagination is switched on even when the job file leaves it disabled.
pub async fn run(args: &PaginateArgs, cli: &Cli) -> Result<ExitCode> {
    let mut config = cli.load_config()?;
    config.pagination.enabled = true;
    if let Some(max) = args.max_pages {
        config.pagination.max_pages = Some(max);
    }

    let start = FetchTarget::parse(&args.url)?;
    let orchestrator = build_orchestrator(&config)?;
    cancel_on_interrupt(&orchestrator);
    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());

    let run = orchestrator.scrape_paginated(&start).await;
    printer.emit(&printer.render_run(&run)?)?;
    if !cli.quiet {
        printer.emit_err(&printer.render_stats(&orchestrator.stats())?)?;
    }

    Ok(if run.failure.is_some() {
        ExitCode::PartialFailure
    } else {
        ExitCode::Success
    })
}
