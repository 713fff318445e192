// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Sieve CLI - declarative scraping from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Scrape the targets listed in a job file
//! sieve --config job.yaml scrape
//!
//! # Scrape extra URLs with the job's rules, as JSON lines
//! sieve -c job.yaml --format json scrape https://example.com/a https://example.com/b
//!
//! # Follow pagination from one start page
//! sieve -c job.yaml paginate https://example.com/list
//!
//! # Apply the rules to a saved page, no network
//! sieve -c job.yaml extract --file page.html --base-url https://example.com/
//!
//! # Collect URLs from a sitemap index and scrape them
//! sieve -c job.yaml sitemap https://example.com/sitemap.xml --scrape
//!
//! # Scrape a list of URLs, one per line
//! sieve -c job.yaml batch --file urls.txt -j 8
//!
//! # Validate a job file
//! sieve -c job.yaml check
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sieve_core::{CoreError, ScrapeConfig};
use sieve_fetch::FetchError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{batch, check, extract, paginate, scrape, sitemap};

// ============================================================================
// CLI Definition
// ============================================================================

/// Sieve CLI - declarative extraction and scrape orchestration.
#[derive(Parser)]
#[command(name = "sieve")]
#[command(about = "Rule-based web extraction with rate limiting, retries, and pagination")]
#[command(long_about = r#"
Sieve fetches pages and extracts structured data with declarative rules.

A job file (JSON, or YAML for .yaml/.yml) lists the rules and tunes the
orchestrator: concurrency, rate limit, retries, and pagination.

Examples:
  sieve -c job.yaml scrape                  # Scrape the job's targets
  sieve -c job.yaml scrape URL...           # Scrape extra URLs
  sieve -c job.yaml paginate URL            # Follow pagination
  sieve -c job.yaml extract --file page.html
  sieve sitemap URL                         # List URLs from a sitemap
  sieve -c job.yaml batch --file urls.txt   # Scrape a URL list
  sieve -c job.yaml check                   # Validate the job
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Job file with rules and tuning.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Scrape the job's targets and any URLs given.
    #[command(visible_alias = "s")]
    Scrape(scrape::ScrapeArgs),

    /// Follow pagination from a start URL.
    #[command(visible_alias = "p")]
    Paginate(paginate::PaginateArgs),

    /// Apply the job's rules to a local file.
    #[command(visible_alias = "x")]
    Extract(extract::ExtractArgs),

    /// Collect page URLs from a sitemap, optionally scraping them.
    #[command(visible_alias = "m")]
    Sitemap(sitemap::SitemapArgs),

    /// Scrape URLs listed in a file.
    #[command(visible_alias = "b")]
    Batch(batch::BatchArgs),

    /// Validate the job file.
    Check,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Some targets failed.
    PartialFailure = 2,
    /// The job file or rules are invalid.
    Configuration = 3,
}

impl Cli {
    /// Loads the job file, or an empty job when none was given.
    pub fn load_config(&self) -> Result<ScrapeConfig> {
        match &self.config {
            Some(path) => Ok(ScrapeConfig::load_from(path)?),
            None => Ok(ScrapeConfig::default()),
        }
    }

    /// Whether text output may use ANSI colors.
    pub fn use_colors(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}

/// Maps a top-level error to its exit code.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    if let Some(core) = error.downcast_ref::<CoreError>() {
        return match core {
            CoreError::Parse { .. } | CoreError::MissingRequired { .. } => ExitCode::Error,
            _ => ExitCode::Configuration,
        };
    }
    if let Some(fetch) = error.downcast_ref::<FetchError>() {
        if fetch.kind() == sieve_fetch::ErrorKind::Configuration {
            return ExitCode::Configuration;
        }
    }
    ExitCode::Error
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("sieve=debug,sieve_core=debug,sieve_fetch=debug,info")
    } else {
        EnvFilter::new("sieve=warn,sieve_core=warn,sieve_fetch=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Scrape(args) => scrape::run(args, &cli).await,
        Commands::Paginate(args) => paginate::run(args, &cli).await,
        Commands::Extract(args) => extract::run(args, &cli),
        Commands::Sitemap(args) => sitemap::run(args, &cli).await,
        Commands::Batch(args) => batch::run(args, &cli).await,
        Commands::Check => check::run(&cli),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            exit_code_for(&e)
        }
    };

    std::process::exit(code as i32);
}
