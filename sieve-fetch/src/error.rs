//! Fetch error types.

use serde::{Deserialize, Serialize};
use sieve_core::CoreError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch and orchestration operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed in the client.
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// Connection-level failure reported by a fetcher.
    #[error("Network error: {0}")]
    Network(String),

    /// A fetch attempt exceeded its timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered 429.
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Upstream retry-after hint.
        retry_after: Option<Duration>,
    },

    /// Upstream answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code.
        status: u16,
        /// Upstream retry-after hint (sent with 503 responses).
        retry_after: Option<Duration>,
    },

    /// Upstream rejected the credentials (401/403).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The target URL cannot be fetched.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Parsing, resolution, or configuration error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The batch was cancelled before this target completed.
    #[error("Cancelled")]
    Cancelled,

    /// Writing an outcome failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A task failed outside of normal error handling.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Classifies the error for sinks and the retry policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Request(e) if e.is_builder() => ErrorKind::Configuration,
            Self::Request(e) if e.is_status() => ErrorKind::HttpStatus,
            Self::Request(_) | Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Status { .. } => ErrorKind::HttpStatus,
            Self::AuthenticationFailed(_) => ErrorKind::Authentication,
            Self::InvalidTarget(_) => ErrorKind::Configuration,
            Self::Core(core) => match core {
                CoreError::Parse { .. } | CoreError::Serialization(_) => ErrorKind::Parse,
                CoreError::MissingRequired { .. } => ErrorKind::Parsing,
                CoreError::Io(_) => ErrorKind::Internal,
                _ => ErrorKind::Configuration,
            },
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Upstream retry-after hint, if the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status code, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ============================================================================
// Error Kind
// ============================================================================

/// Failure class reported in [`Failure`](crate::Failure) entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad rule, transform, tuning value, or locator/document mismatch.
    Configuration,
    /// The payload could not be parsed.
    Parse,
    /// A required rule matched nothing.
    Parsing,
    /// Connection failure.
    Network,
    /// Attempt timeout.
    Timeout,
    /// Upstream 429.
    RateLimited,
    /// Other non-success status.
    HttpStatus,
    /// Upstream rejected credentials.
    Authentication,
    /// Batch cancelled.
    Cancelled,
    /// Unexpected task failure.
    Internal,
}

impl ErrorKind {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Parse => "parse",
            Self::Parsing => "parsing",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::HttpStatus => "http_status",
            Self::Authentication => "authentication",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
