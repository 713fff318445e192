//! CLI command implementations.

pub mod batch;
pub mod check;
pub mod extract;
pub mod paginate;
pub mod scrape;
pub mod sitemap;

use anyhow::Result;
use sieve_core::ScrapeConfig;
use sieve_fetch::{FetchTarget, HttpFetcher, Orchestrator};
use tracing::{debug, warn};

/// Builds an orchestrator over the HTTP fetcher described by the job.
pub(crate) fn build_orchestrator(config: &ScrapeConfig) -> Result<Orchestrator> {
    let mut builder = HttpFetcher::builder();
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    for (name, value) in &config.headers {
        builder = builder.header(name.clone(), value.clone());
    }

    let orchestrator = Orchestrator::from_config(config, builder.build()?)?;
    debug!(?orchestrator, "Orchestrator ready");
    Ok(orchestrator)
}

/// Parses target URLs.
pub(crate) fn parse_targets<'a>(urls: impl IntoIterator<Item = &'a String>) -> Result<Vec<FetchTarget>> {
    urls.into_iter()
        .map(|url| FetchTarget::parse(url).map_err(Into::into))
        .collect()
}

/// Cancels the orchestrator on Ctrl-C.
pub(crate) fn cancel_on_interrupt(orchestrator: &Orchestrator) {
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight targets");
            token.cancel();
        }
    });
}
