//! Per-target outcomes and run statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sieve_core::ExtractionResult;

use crate::error::{ErrorKind, FetchError};
use crate::pagination::TerminationReason;
use crate::target::FetchTarget;

// ============================================================================
// Page Result
// ============================================================================

/// A successfully fetched and extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// The requested URL.
    pub target: String,
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status.
    pub status: u16,
    /// Attempts it took, including the successful one.
    pub attempts: u32,
    /// Extracted values.
    pub result: ExtractionResult,
}

// ============================================================================
// Failure
// ============================================================================

/// A target that could not be scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// The requested URL.
    pub target: String,
    /// Failure class.
    pub error_kind: ErrorKind,
    /// Human-readable cause.
    pub message: String,
    /// Fetch attempts made before giving up.
    pub attempts_made: u32,
}

impl Failure {
    /// Builds a failure from the terminal error.
    pub fn from_error(target: &FetchTarget, error: &FetchError, attempts_made: u32) -> Self {
        Self {
            target: target.to_string(),
            error_kind: error.kind(),
            message: error.to_string(),
            attempts_made,
        }
    }

    /// A target that was never started because the batch was cancelled.
    pub fn cancelled(target: &FetchTarget) -> Self {
        Self::from_error(target, &FetchError::Cancelled, 0)
    }

    /// A page whose required rules matched nothing.
    pub fn missing_required(target: &FetchTarget, result: &ExtractionResult, attempts_made: u32) -> Self {
        let names: Vec<&str> = result.missing_required.iter().map(String::as_str).collect();
        Self {
            target: target.to_string(),
            error_kind: ErrorKind::Parsing,
            message: format!("Required rules matched nothing: {}", names.join(", ")),
            attempts_made,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] after {} attempt(s): {}",
            self.target, self.error_kind, self.attempts_made, self.message
        )
    }
}

/// Outcome for one target: extracted page or failure.
pub type ScrapeOutcome = Result<PageResult, Failure>;

// ============================================================================
// Paginated Run
// ============================================================================

/// The pages collected by one pagination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedRun {
    /// Starting URL.
    pub start: String,
    /// Pages in visit order, including those before a failure.
    pub pages: Vec<PageResult>,
    /// Why the run ended.
    pub termination: TerminationReason,
    /// The failure that ended the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl PaginatedRun {
    /// Total items over all pages.
    pub fn total_items(&self) -> usize {
        self.pages.iter().map(|p| p.result.total_items()).sum()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Live counters shared by an orchestrator's tasks.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
    bytes: AtomicU64,
}

impl ScrapeStats {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bytes(&self, bytes: usize) {
        self.bytes
            .fetch_add(u64::try_from(bytes).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            bytes_received: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ScrapeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Fetch attempts started.
    pub requests: u64,
    /// Pages extracted.
    pub successes: u64,
    /// Targets or pages that failed.
    pub failures: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// Upstream 429 responses.
    pub rate_limited: u64,
    /// Response bytes received.
    pub bytes_received: u64,
}

impl StatsSnapshot {
    /// Share of finished targets that succeeded, in `0.0..=1.0`.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            0.0
        } else {
            self.successes as f64 / finished as f64
        }
    }
}
