//! Core error types for sieve.

use thiserror::Error;

use crate::models::ContentKind;

/// Core error type for rule, document, and resolution operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed rule, unknown transform, or invalid tuning value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A locator kind was used against a document kind that cannot answer it.
    #[error("Locator {locator} cannot be evaluated against a {kind} document")]
    KindMismatch {
        /// Locator description (e.g. `css:h1`).
        locator: String,
        /// Kind of the document that was queried.
        kind: ContentKind,
    },

    /// The backend could not parse the payload.
    #[error("Failed to parse {snippet_len}-byte payload with {backend}: {reason}")]
    Parse {
        /// Backend that rejected the payload.
        backend: &'static str,
        /// Length in bytes of the offending payload.
        snippet_len: usize,
        /// Backend-specific reason.
        reason: String,
    },

    /// A required rule matched nothing and has no default.
    #[error("Required field '{rule}' not found (locator: {locator})")]
    MissingRequired {
        /// Name of the rule.
        rule: String,
        /// Locator chain that was tried.
        locator: String,
    },

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true for errors that indicate a caller or configuration bug
    /// rather than a problem with fetched data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::KindMismatch { .. } | Self::Yaml(_)
        )
    }
}
