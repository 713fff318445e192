//! The scrape orchestrator.
//!
//! Runs fetch tasks under a concurrency bound. Each attempt takes a
//! rate-limiter token and carries its own timeout. Failures go to the retry
//! policy, successes are parsed and resolved against the job's rules. Batch
//! results come back in input order, with one entry per target.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sieve_core::{
    CoreError, Document, ExtractionResult, ExtractionRule, PaginationConfig, RateLimitConfig,
    RetryConfig, RuleResolver, ScrapeConfig, TransformRegistry,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::outcome::{Failure, PageResult, PaginatedRun, ScrapeOutcome, ScrapeStats, StatsSnapshot};
use crate::pagination::{PageSignal, PaginationDriver, TerminationReason};
use crate::rate_limit::RateLimiter;
use crate::retry::{RetryContext, RetryDecision, RetryPolicy};
use crate::sink::OutcomeSink;
use crate::target::{FetchTarget, RawResponse};

/// Default number of targets in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default per-attempt timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates fetching, retrying, and extraction for many targets.
///
/// Cloning is cheap; clones share the rate limiter, statistics, and
/// cancellation token.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn Fetcher>,
    resolver: RuleResolver,
    limiter: RateLimiter,
    retry: RetryPolicy,
    pagination: PaginationConfig,
    fetch_timeout: Duration,
    concurrency: usize,
    retry_after_header: String,
    cancel: CancellationToken,
    stats: ScrapeStats,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("fetcher", &self.inner.fetcher.name())
            .field("rules", &self.inner.resolver.rules().len())
            .field("concurrency", &self.inner.concurrency)
            .field("fetch_timeout", &self.inner.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Starts building an orchestrator around a fetcher.
    pub fn builder(fetcher: impl Fetcher + 'static) -> OrchestratorBuilder {
        OrchestratorBuilder::new(Arc::new(fetcher))
    }

    /// Builds an orchestrator from a job config.
    ///
    /// Every configuration problem surfaces here, before anything is fetched.
    pub fn from_config(config: &ScrapeConfig, fetcher: impl Fetcher + 'static) -> Result<Self, FetchError> {
        config.validate()?;
        Self::builder(fetcher)
            .rules(config.rules.iter().cloned())
            .rate_limit(config.rate_limit.clone())
            .retry(config.retry.clone())
            .pagination(config.pagination.clone())
            .fetch_timeout(config.fetch_timeout())
            .concurrency(config.concurrency)
            .build()
    }

    /// The rule resolver applied to every page.
    pub fn resolver(&self) -> &RuleResolver {
        &self.inner.resolver
    }

    /// Configured concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Per-attempt timeout.
    pub fn fetch_timeout(&self) -> Duration {
        self.inner.fetch_timeout
    }

    /// Current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stops admitting targets and interrupts in-flight tasks at their next
    /// suspension point.
    pub fn cancel(&self) {
        info!("Cancelling scrape");
        self.inner.cancel.cancel();
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// The token behind [`cancel`](Self::cancel).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Fetches and extracts one target.
    pub async fn scrape_one(&self, target: &FetchTarget) -> ScrapeOutcome {
        self.inner.run_target(target).await
    }

    /// Fetches one target under the rate limit and retry policy without
    /// extracting it. Returns the response and the attempts it took.
    pub async fn fetch(&self, target: &FetchTarget) -> Result<(RawResponse, u32), Failure> {
        self.inner
            .fetch_with_retry(target)
            .await
            .map_err(|(err, attempts)| Failure::from_error(target, &err, attempts))
    }

    /// Scrapes `targets` with at most `limit` in flight.
    ///
    /// The result has one entry per target, in input order. Targets not
    /// admitted before cancellation come back as `cancelled` failures.
    pub async fn scrape_many(&self, targets: Vec<FetchTarget>, limit: usize) -> Vec<ScrapeOutcome> {
        info!(targets = targets.len(), concurrency = limit, "Starting batch");
        let outcomes = self
            .run_bounded(
                targets,
                limit,
                |inner, target| async move { inner.run_target(&target).await },
                |target, error| {
                    Err(match error {
                        Some(message) => {
                            Failure::from_error(target, &FetchError::Internal(message), 0)
                        }
                        None => Failure::cancelled(target),
                    })
                },
            )
            .await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(
            succeeded = outcomes.len() - failed,
            failed, "Batch finished"
        );
        outcomes
    }

    /// Like [`scrape_many`](Self::scrape_many), then hands every outcome to
    /// `sink` in input order.
    pub async fn scrape_many_into(
        &self,
        targets: Vec<FetchTarget>,
        limit: usize,
        sink: &dyn OutcomeSink,
    ) -> Result<Vec<ScrapeOutcome>, FetchError> {
        let outcomes = self.scrape_many(targets, limit).await;
        for (index, outcome) in outcomes.iter().enumerate() {
            sink.accept(index, outcome).await?;
        }
        sink.finish().await?;
        Ok(outcomes)
    }

    /// Follows pagination from `start` until the run terminates.
    ///
    /// Pages collected before a failure are kept.
    pub async fn scrape_paginated(&self, start: &FetchTarget) -> PaginatedRun {
        self.inner.run_paginated(start).await
    }

    /// Runs several independent pagination runs with at most `limit` in flight.
    pub async fn scrape_paginated_many(&self, starts: Vec<FetchTarget>, limit: usize) -> Vec<PaginatedRun> {
        info!(runs = starts.len(), concurrency = limit, "Starting paginated batch");
        self.run_bounded(
            starts,
            limit,
            |inner, start| async move { inner.run_paginated(&start).await },
            |start, error| {
                let (termination, failure) = match error {
                    Some(message) => (
                        TerminationReason::PageFailed,
                        Failure::from_error(start, &FetchError::Internal(message), 0),
                    ),
                    None => (TerminationReason::Cancelled, Failure::cancelled(start)),
                };
                PaginatedRun {
                    start: start.to_string(),
                    pages: Vec::new(),
                    termination,
                    failure: Some(failure),
                }
            },
        )
        .await
    }

    /// Spawns one task per target under a semaphore and joins them in input
    /// order. `abandoned` builds the entry for targets that never ran
    /// (`None`) or whose task died (`Some(message)`).
    async fn run_bounded<R, F, Fut>(
        &self,
        targets: Vec<FetchTarget>,
        limit: usize,
        task: F,
        abandoned: impl Fn(&FetchTarget, Option<String>) -> R,
    ) -> Vec<R>
    where
        R: Send + 'static,
        F: Fn(Arc<Inner>, FetchTarget) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        enum Slot<R> {
            Running(FetchTarget, JoinHandle<R>),
            Skipped(FetchTarget),
        }

        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        let mut slots = Vec::with_capacity(targets.len());

        for target in targets {
            let permit = tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                debug!(url = %target.url, "Batch cancelled, target not admitted");
                slots.push(Slot::Skipped(target));
                continue;
            };

            let work = task(Arc::clone(&self.inner), target.clone());
            let handle = tokio::spawn(async move {
                let result = work.await;
                drop(permit);
                result
            });
            slots.push(Slot::Running(target, handle));
        }

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Running(target, handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(url = %target.url, error = %e, "Scrape task failed");
                        self.inner.stats.record_failure();
                        abandoned(&target, Some(e.to_string()))
                    }
                },
                Slot::Skipped(target) => {
                    self.inner.stats.record_failure();
                    abandoned(&target, None)
                }
            };
            results.push(result);
        }
        results
    }
}

// ============================================================================
// Task Execution
// ============================================================================

impl Inner {
    async fn run_target(&self, target: &FetchTarget) -> ScrapeOutcome {
        let outcome = match self.fetch_with_retry(target).await {
            Ok((response, attempts)) => self
                .extract_page(target, &response, attempts, None)
                .map(|(page, _)| page),
            Err((err, attempts)) => Err(Failure::from_error(target, &err, attempts)),
        };

        match &outcome {
            Ok(_) => self.stats.record_success(),
            Err(failure) => {
                self.stats.record_failure();
                warn!(url = %target.url, kind = %failure.error_kind, message = %failure.message, "Target failed");
            }
        }
        outcome
    }

    async fn run_paginated(&self, start: &FetchTarget) -> PaginatedRun {
        let next_rule = self.pagination.next_page.as_ref();
        let mut driver = PaginationDriver::new(&self.pagination, start.url.clone());
        let mut pages = Vec::new();
        let mut failure = None;

        while let Some(url) = driver.begin_fetch() {
            if self.cancel.is_cancelled() {
                driver.on_failed(TerminationReason::Cancelled);
                break;
            }
            let target = FetchTarget {
                url,
                headers: start.headers.clone(),
            };

            let (response, attempts) = match self.fetch_with_retry(&target).await {
                Ok(fetched) => fetched,
                Err((err, attempts)) => {
                    let reason = if matches!(err, FetchError::Cancelled) {
                        TerminationReason::Cancelled
                    } else {
                        TerminationReason::PageFailed
                    };
                    driver.on_failed(reason);
                    self.stats.record_failure();
                    failure = Some(Failure::from_error(&target, &err, attempts));
                    break;
                }
            };
            driver.on_fetched();

            match self.extract_page(&target, &response, attempts, next_rule) {
                Ok((page, next)) => {
                    let item_count = match &self.pagination.items_rule {
                        Some(name) => page.result.item_count(name),
                        None => page.result.total_items(),
                    };
                    driver.on_extracted(PageSignal {
                        next: next.as_ref(),
                        item_count,
                        body: &response.body,
                    });
                    self.stats.record_success();
                    pages.push(page);
                }
                Err(page_failure) => {
                    driver.on_failed(TerminationReason::PageFailed);
                    self.stats.record_failure();
                    failure = Some(page_failure);
                }
            }
        }

        let termination = driver.termination().unwrap_or(TerminationReason::Cancelled);
        info!(
            start = %start.url,
            pages = pages.len(),
            termination = %termination,
            "Pagination finished"
        );
        PaginatedRun {
            start: start.to_string(),
            pages,
            termination,
            failure,
        }
    }

    /// Fetches with rate limiting, per-attempt timeouts, and retries.
    /// Returns the response (or terminal error) and the attempts made.
    #[instrument(skip(self, target), fields(url = %target.url))]
    async fn fetch_with_retry(&self, target: &FetchTarget) -> Result<(RawResponse, u32), (FetchError, u32)> {
        let mut ctx = RetryContext::new();

        loop {
            if let Err(err) = self.limiter.acquire_cancellable(&self.cancel).await {
                return Err((err, ctx.attempt));
            }

            self.stats.record_request();
            debug!(attempt = ctx.attempt, fetcher = self.fetcher.name(), "Fetch attempt");

            let fetched = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Err(FetchError::Cancelled),
                result = tokio::time::timeout(
                    self.fetch_timeout,
                    self.fetcher.fetch(target, self.fetch_timeout),
                ) => result.unwrap_or_else(|_| Err(FetchError::Timeout(self.fetch_timeout))),
            };

            let err = match fetched.and_then(|r| r.error_for_status(&self.retry_after_header)) {
                Ok(response) => {
                    self.stats.record_bytes(response.body.len());
                    debug!(status = response.status, bytes = response.body.len(), "Fetched");
                    return Ok((response, ctx.attempts_made()));
                }
                Err(err) => err,
            };

            if matches!(err, FetchError::RateLimited { .. }) {
                self.stats.record_rate_limited();
            }

            match self.retry.next_action(&mut ctx, &err) {
                RetryDecision::GiveUp => return Err((err, ctx.attempts_made())),
                RetryDecision::Retry(delay) => {
                    self.stats.record_retry();
                    warn!(
                        attempt = ctx.attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Retrying after failure"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err((FetchError::Cancelled, ctx.attempt)),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Parses a response and resolves the job's rules. The document never
    /// outlives this call.
    fn extract_page(
        &self,
        target: &FetchTarget,
        response: &RawResponse,
        attempts: u32,
        next_rule: Option<&ExtractionRule>,
    ) -> Result<(PageResult, Option<Value>), Failure> {
        let (result, next) = self
            .extract_document(response, next_rule)
            .map_err(|e| Failure::from_error(target, &FetchError::Core(e), attempts))?;

        if !result.is_complete() {
            return Err(Failure::missing_required(target, &result, attempts));
        }

        Ok((
            PageResult {
                target: target.to_string(),
                url: response.url.to_string(),
                status: response.status,
                attempts,
                result,
            },
            next,
        ))
    }

    fn extract_document(
        &self,
        response: &RawResponse,
        next_rule: Option<&ExtractionRule>,
    ) -> Result<(ExtractionResult, Option<Value>), CoreError> {
        let document = Document::from_bytes(&response.body, response.content_kind)?
            .with_base_url(response.url.clone());
        let result = self.resolver.extract(&document)?;

        let next = match next_rule {
            None => None,
            Some(rule) => match self.resolver.resolve(&document, rule) {
                Ok(value) => Some(value),
                Err(CoreError::MissingRequired { .. }) => Some(Value::Null),
                Err(e) => return Err(e),
            },
        };
        Ok((result, next))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    fetcher: Arc<dyn Fetcher>,
    transforms: Arc<TransformRegistry>,
    rules: Vec<ExtractionRule>,
    rate_limit: RateLimitConfig,
    retry: RetryConfig,
    pagination: PaginationConfig,
    fetch_timeout: Duration,
    concurrency: usize,
    cancel: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    /// Creates a builder with default tuning and no rules.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            transforms: Arc::new(TransformRegistry::new()),
            rules: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            pagination: PaginationConfig::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: None,
        }
    }

    /// Sets the transform registry rules are checked against.
    #[must_use]
    pub fn transforms(mut self, transforms: Arc<TransformRegistry>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Adds one rule.
    #[must_use]
    pub fn rule(mut self, rule: ExtractionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds rules.
    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = ExtractionRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Sets rate limiting.
    #[must_use]
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Sets pagination.
    #[must_use]
    pub fn pagination(mut self, config: PaginationConfig) -> Self {
        self.pagination = config;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the default concurrency limit.
    #[must_use]
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    /// Uses an external cancellation token.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validates everything and builds the orchestrator.
    pub fn build(self) -> Result<Orchestrator, FetchError> {
        if self.concurrency == 0 {
            return Err(CoreError::config("concurrency must be at least 1").into());
        }
        if self.fetch_timeout.is_zero() {
            return Err(CoreError::config("fetch timeout must be positive").into());
        }
        self.rate_limit.validate()?;
        self.retry.validate()?;
        self.pagination.validate(&self.rules)?;

        let resolver = RuleResolver::with_rules(self.transforms, self.rules)?;
        if let Some(rule) = &self.pagination.next_page {
            resolver.check(rule)?;
        }

        let limiter = RateLimiter::from_config(&self.rate_limit)?;
        let retry = RetryPolicy::from_config(&self.retry);

        debug!(
            rules = resolver.rules().len(),
            concurrency = self.concurrency,
            rate_limited = !limiter.is_unlimited(),
            max_attempts = retry.max_attempts,
            "Built orchestrator"
        );

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                resolver,
                limiter,
                retry,
                pagination: self.pagination,
                fetch_timeout: self.fetch_timeout,
                concurrency: self.concurrency,
                retry_after_header: self.rate_limit.retry_after_header,
                cancel: self.cancel.unwrap_or_default(),
                stats: ScrapeStats::default(),
            }),
        })
    }
}
