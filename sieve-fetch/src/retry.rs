//! Retry policy for fetch attempts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sieve_core::RetryConfig;

use crate::error::{ErrorKind, FetchError};

/// Fraction of the computed delay added at most when jitter is on.
const JITTER_FRACTION: f64 = 0.1;

// ============================================================================
// Classification
// ============================================================================

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// Transient: connection failures, timeouts, configured statuses.
    Retryable,
    /// Permanent: retrying cannot help.
    Fatal,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Surface the error as terminal.
    GiveUp,
}

// ============================================================================
// Retry Context
// ============================================================================

/// Per-target retry bookkeeping. `attempt` is 0 for the first try.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryContext {
    /// Index of the current attempt.
    pub attempt: u32,
    /// Class of the last failure.
    pub last_error: Option<ErrorKind>,
    /// Delay chosen before the current attempt.
    pub next_delay: Option<Duration>,
}

impl RetryContext {
    /// Creates a context for a fresh target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts made once the current one has finished.
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Exponential backoff with a retry budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per target, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on computed delays.
    pub max_delay: Duration,
    /// Multiplier per attempt.
    pub exponential_base: f64,
    /// Adds up to 10% random extra delay to computed backoff.
    pub jitter: bool,
    /// HTTP statuses treated as transient.
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Creates a policy with the default backoff and `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Builds the policy described by a job config.
    pub fn from_config(config: &RetryConfig) -> Self {
        if !config.enabled {
            return Self::no_retry();
        }
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            exponential_base: config.exponential_base.max(1.0),
            jitter: config.jitter,
            retry_statuses: config.retry_on_status_codes.clone(),
        }
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the per-attempt multiplier.
    #[must_use]
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base.max(1.0);
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Computed backoff after a failed attempt: `initial * base^attempt`,
    /// capped at `max_delay`. Jitter is not included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.exponential_base.powf(f64::from(attempt));
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Classifies a failure.
    pub fn classify(&self, error: &FetchError) -> RetryClass {
        let retryable = match error {
            FetchError::Request(e) if e.is_builder() => false,
            FetchError::Request(e) => match e.status() {
                Some(status) => self.retry_statuses.contains(&status.as_u16()),
                None => true,
            },
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::RateLimited { .. } => self.retry_statuses.contains(&429),
            FetchError::Status { status, .. } => self.retry_statuses.contains(status),
            FetchError::AuthenticationFailed(_)
            | FetchError::InvalidTarget(_)
            | FetchError::Core(_)
            | FetchError::Cancelled
            | FetchError::Io(_)
            | FetchError::Internal(_) => false,
        };
        if retryable {
            RetryClass::Retryable
        } else {
            RetryClass::Fatal
        }
    }

    /// Determines if an error should be retried at all.
    pub fn should_retry(&self, error: &FetchError) -> bool {
        self.classify(error) == RetryClass::Retryable
    }

    /// Delay before the next attempt. An upstream retry-after hint replaces
    /// the computed delay; it is capped at `max_delay` but never jittered.
    pub fn backoff(&self, attempt: u32, error: &FetchError) -> Duration {
        if let Some(hint) = error.retry_after() {
            return hint.min(self.max_delay);
        }
        let delay = self.delay_for_attempt(attempt);
        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
            delay.mul_f64(1.0 + extra)
        } else {
            delay
        }
    }

    /// Records a failed attempt and decides what happens next.
    ///
    /// On [`RetryDecision::Retry`] the context moves on to the next attempt.
    pub fn next_action(&self, ctx: &mut RetryContext, error: &FetchError) -> RetryDecision {
        ctx.last_error = Some(error.kind());

        if !self.should_retry(error) || ctx.attempts_made() >= self.max_attempts {
            ctx.next_delay = None;
            return RetryDecision::GiveUp;
        }

        let delay = self.backoff(ctx.attempt, error);
        ctx.attempt += 1;
        ctx.next_delay = Some(delay);
        RetryDecision::Retry(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::CoreError;

    fn timeout() -> FetchError {
        FetchError::Timeout(Duration::from_secs(30))
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(10).with_initial_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(500), Duration::from_secs(60));
    }

    #[test]
    fn test_three_failures_give_two_retries() {
        let policy = RetryPolicy::default();
        let mut ctx = RetryContext::new();

        assert_eq!(
            policy.next_action(&mut ctx, &timeout()),
            RetryDecision::Retry(Duration::from_secs(1))
        );
        assert_eq!(
            policy.next_action(&mut ctx, &timeout()),
            RetryDecision::Retry(Duration::from_secs(2))
        );
        assert_eq!(policy.next_action(&mut ctx, &timeout()), RetryDecision::GiveUp);
        assert_eq!(ctx.attempts_made(), 3);
        assert_eq!(ctx.last_error, Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_classification() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(&timeout()));
        assert!(policy.should_retry(&FetchError::Network("reset".into())));
        assert!(policy.should_retry(&FetchError::RateLimited { retry_after: None }));
        for status in [502, 503, 504] {
            assert!(policy.should_retry(&FetchError::Status {
                status,
                retry_after: None
            }));
        }

        assert_eq!(
            policy.classify(&FetchError::Status {
                status: 404,
                retry_after: None
            }),
            RetryClass::Fatal
        );
        assert!(!policy.should_retry(&FetchError::Status {
            status: 500,
            retry_after: None
        }));
        assert!(!policy.should_retry(&FetchError::AuthenticationFailed("no".into())));
        assert!(!policy.should_retry(&FetchError::Core(CoreError::config("bad"))));
        assert!(!policy.should_retry(&FetchError::Cancelled));
    }

    #[test]
    fn test_fatal_error_gives_up_immediately() {
        let policy = RetryPolicy::default();
        let mut ctx = RetryContext::new();
        let err = FetchError::Status {
            status: 404,
            retry_after: None,
        };

        assert_eq!(policy.next_action(&mut ctx, &err), RetryDecision::GiveUp);
        assert_eq!(ctx.attempts_made(), 1);
        assert_eq!(ctx.last_error, Some(ErrorKind::HttpStatus));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let mut ctx = RetryContext::new();
        let err = FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(45)),
        };

        assert_eq!(
            policy.next_action(&mut ctx, &err),
            RetryDecision::Retry(Duration::from_secs(45))
        );
        assert_eq!(ctx.next_delay, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_retry_after_is_capped_at_max_delay() {
        let policy = RetryPolicy::default();
        let huge = crate::target::parse_retry_after("1e30", chrono::Utc::now());
        assert!(huge.is_some());

        let err = FetchError::Status {
            status: 503,
            retry_after: huge,
        };
        assert_eq!(policy.backoff(0, &err), policy.max_delay);
        assert_eq!(policy.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::default().with_jitter(true);
        for _ in 0..100 {
            let delay = policy.backoff(1, &timeout());
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_disabled_config_never_retries() {
        let config = RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        let mut ctx = RetryContext::new();

        assert_eq!(policy.next_action(&mut ctx, &timeout()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_custom_status_list() {
        let config = RetryConfig {
            retry_on_status_codes: vec![500],
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);

        assert!(policy.should_retry(&FetchError::Status {
            status: 500,
            retry_after: None
        }));
        assert!(!policy.should_retry(&FetchError::RateLimited { retry_after: None }));
    }
}
