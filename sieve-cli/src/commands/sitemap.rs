//! Sitemap command implementation.
//!
//! Collects page URLs from a sitemap (following sitemap indexes) and
//! optionally scrapes them with the job's rules.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use sieve_core::CoreError;
use sieve_fetch::{DEFAULT_SITEMAP_DEPTH, FetchTarget, SitemapCollection};
use tracing::info;

use super::{build_orchestrator, cancel_on_interrupt};
use crate::output::{Printer, StdoutSink};
use crate::{Cli, ExitCode};

/// Arguments for `sitemap`.
#[derive(Debug, Args)]
pub struct SitemapArgs {
    /// Sitemap or sitemap index URL.
    pub url: String,

    /// Index levels followed below the root.
    #[arg(long, default_value_t = DEFAULT_SITEMAP_DEPTH)]
    pub max_depth: u32,

    /// Write the collected URLs to a file, one per line.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Scrape every collected URL with the job's rules.
    #[arg(long)]
    pub scrape: bool,

    /// Maximum targets in flight when scraping (defaults to the job's concurrency).
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,
}

/// Run the sitemap command.
pub async fn run(args: &SitemapArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let root = FetchTarget::parse(&args.url)?;

    let limit = args.concurrency.unwrap_or(config.concurrency);
    if args.scrape && limit == 0 {
        return Err(CoreError::config("concurrency must be at least 1").into());
    }

    let orchestrator = build_orchestrator(&config)?;
    cancel_on_interrupt(&orchestrator);
    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());

    let collection = orchestrator
        .collect_sitemap(&root, args.max_depth)
        .await
        .map_err(|failure| anyhow!("reading sitemap {}: {}", failure.target, failure.message))?;

    if let Some(path) = &args.output {
        write_urls(path, &collection)?;
        info!(path = %path.display(), urls = collection.urls.len(), "Wrote sitemap URLs");
    }
    printer.emit(&printer.render_sitemap(&collection, args.output.is_none() && !args.scrape)?)?;

    let mut failures = collection.failures.len();
    if args.scrape {
        let targets = collection.targets();
        info!(targets = targets.len(), concurrency = limit, "Scraping sitemap URLs");
        let outcomes = orchestrator
            .scrape_many_into(targets, limit, &StdoutSink::new(&printer))
            .await?;
        failures += outcomes.iter().filter(|outcome| outcome.is_err()).count();

        if !cli.quiet {
            printer.emit_err(&printer.render_stats(&orchestrator.stats())?)?;
        }
    }

    Ok(if failures == 0 {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    })
}

fn write_urls(path: &Path, collection: &SitemapCollection) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    for loc in collection.locations() {
        writeln!(out, "{loc}")?;
    }
    out.flush().with_context(|| format!("writing {}", path.display()))
}
