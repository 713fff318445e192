// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Sieve Fetch
//!
//! Scrape orchestration for sieve.
//!
//! This crate fetches targets and feeds every response into the
//! [`sieve_core`] rule engine:
//!
//! ## Orchestration
//!
//! - [`Orchestrator`] - Concurrency-bounded batches, retries, pagination
//! - [`RateLimiter`] - Token bucket shared by all tasks of an orchestrator
//! - [`RetryPolicy`] - Failure classification and exponential backoff
//! - [`PaginationDriver`] - Per-run pagination state machine
//! - [`Orchestrator::collect_sitemap`] - Page URLs from a sitemap or sitemap
//!   index ([`SitemapCollection`])
//!
//! ## Collaborators
//!
//! - [`Fetcher`] - Fetch contract ([`host::http::HttpFetcher`] over `reqwest`)
//! - [`OutcomeSink`] - Receives per-target outcomes
//!
//! ## Example
//!
//! ```no_run
//! use sieve_core::ExtractionRule;
//! use sieve_fetch::{FetchTarget, HttpFetcher, Orchestrator};
//!
//! # async fn run() -> Result<(), sieve_fetch::FetchError> {
//! let orchestrator = Orchestrator::builder(HttpFetcher::new()?)
//!     .rule(ExtractionRule::builder("title").selector("h1").build()?)
//!     .build()?;
//!
//! let targets = vec![
//!     FetchTarget::parse("https://example.com/a")?,
//!     FetchTarget::parse("https://example.com/b")?,
//! ];
//! for outcome in orchestrator.scrape_many(targets, 4).await {
//!     match outcome {
//!         Ok(page) => println!("{}: {:?}", page.url, page.result.get("title")),
//!         Err(failure) => eprintln!("{failure}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetcher;
pub mod host;
pub mod orchestrator;
pub mod outcome;
pub mod pagination;
pub mod rate_limit;
pub mod retry;
pub mod sink;
pub mod sitemap;
pub mod target;

// Errors
pub use error::{ErrorKind, FetchError};

// Collaborators
pub use fetcher::Fetcher;
pub use host::http::{HttpFetcher, HttpFetcherBuilder};
pub use sink::{CollectingSink, OutcomeSink};
pub use target::{FetchTarget, RawResponse, parse_retry_after};

// Orchestration
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use outcome::{Failure, PageResult, PaginatedRun, ScrapeOutcome, ScrapeStats, StatsSnapshot};
pub use pagination::{PageSignal, PageState, PaginationDriver, PaginationState, TerminationReason};
pub use rate_limit::RateLimiter;
pub use retry::{RetryClass, RetryContext, RetryDecision, RetryPolicy};
pub use sitemap::{DEFAULT_SITEMAP_DEPTH, SitemapCollection};
