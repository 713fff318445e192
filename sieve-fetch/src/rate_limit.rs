//! Token-bucket rate limiting shared by every fetch task of an orchestrator.
//!
//! The bucket starts full. Each admission refills the bucket from the time
//! elapsed since the last refill (capped at the burst size) and takes one
//! token, all under one lock. A caller that finds the bucket empty computes
//! how long until the next token exists, sleeps once for that long, and
//! checks again. There is no FIFO ordering between waiters.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sieve_core::{CoreError, RateLimitConfig};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// Slack for float error when comparing token counts.
const TOKEN_EPSILON: f64 = 1e-9;

// ============================================================================
// Rate Limiter
// ============================================================================

/// Admission control for outgoing requests.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a limiter refilling `requests_per_second` tokens per second
    /// into a bucket of `burst` tokens.
    pub fn new(requests_per_second: f64, burst: u32) -> Result<Self, FetchError> {
        if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
            return Err(CoreError::config("rate limit must be a positive number").into());
        }
        if burst == 0 {
            return Err(CoreError::config("rate limit burst must be at least 1").into());
        }

        let burst = f64::from(burst);
        Ok(Self {
            bucket: Some(Bucket {
                rate: requests_per_second,
                burst,
                state: Mutex::new(BucketState {
                    tokens: burst,
                    last_refill: Instant::now(),
                }),
            }),
        })
    }

    /// A limiter that admits everything immediately.
    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Builds the limiter described by a job config.
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, FetchError> {
        if config.enabled {
            Self::new(config.requests_per_second, config.burst_size)
        } else {
            Ok(Self::unlimited())
        }
    }

    /// Returns true when no limit is applied.
    pub fn is_unlimited(&self) -> bool {
        self.bucket.is_none()
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.take() {
            debug!(wait_ms = wait.as_millis(), "Waiting for rate limit token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires.
    ///
    /// A token taken before cancellation is not returned.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<(), FetchError> {
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            match self.take() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis(), "Waiting for rate limit token");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(FetchError::Cancelled),
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Takes a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.take().is_ok()
    }

    /// Tokens currently in the bucket, after refill. Infinite when unlimited.
    pub fn available(&self) -> f64 {
        match &self.bucket {
            None => f64::INFINITY,
            Some(bucket) => {
                let mut state = bucket.lock();
                bucket.refill(&mut state, Instant::now());
                state.tokens
            }
        }
    }

    /// Refill and take in one step, or report how long until a token exists.
    fn take(&self) -> Result<(), Duration> {
        let Some(bucket) = &self.bucket else {
            return Ok(());
        };

        let mut state = bucket.lock();
        bucket.refill(&mut state, Instant::now());

        if state.tokens + TOKEN_EPSILON >= 1.0 {
            state.tokens = (state.tokens - 1.0).max(0.0);
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / bucket.rate))
        }
    }
}

impl Bucket {
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // Token state is a plain number, so a panic mid-update cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        state.last_refill = now;
    }
}

// ============================================================================
// Tests
// ============================================================================
