//! The fetch collaborator contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::target::{FetchTarget, RawResponse};

/// Fetches one target.
///
/// Implementations must honor `timeout` for the whole attempt. The
/// orchestrator also enforces it, so a fetcher that ignores it is cut off
/// rather than left hanging. Non-success statuses are returned as responses;
/// the orchestrator maps them to errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name for logs.
    fn name(&self) -> &str {
        "fetcher"
    }

    /// Performs one fetch attempt.
    async fn fetch(&self, target: &FetchTarget, timeout: Duration)
    -> Result<RawResponse, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(
        &self,
        target: &FetchTarget,
        timeout: Duration,
    ) -> Result<RawResponse, FetchError> {
        (**self).fetch(target, timeout).await
    }
}
