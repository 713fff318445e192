//! Scrape job configuration.
//!
//! A job file describes targets, extraction rules, and orchestrator tuning.
//! JSON and YAML are both accepted; the format is picked by file extension.
//! Every field has a default, so a minimal job only needs its rules.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;
use crate::models::ExtractionRule;

// ============================================================================
// Scrape Config
// ============================================================================

/// A complete scrape job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Job name used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Maximum number of targets in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Timeout for each fetch attempt, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: f64,
    /// User agent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Headers sent with every request.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Target URLs.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Extraction rules, applied to every fetched page.
    #[serde(default)]
    pub rules: Vec<ExtractionRule>,
    /// Rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Pagination.
    #[serde(default)]
    pub pagination: PaginationConfig,
}

fn default_name() -> String {
    "sieve".to_string()
}

fn default_concurrency() -> usize {
    5
}

fn default_fetch_timeout() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: None,
            headers: IndexMap::new(),
            targets: Vec::new(),
            rules: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl ScrapeConfig {
    /// Loads and validates a job file (`.yaml`/`.yml` as YAML, anything else as JSON).
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let config: Self = if yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        config.validate()?;

        info!(
            path = %path.display(),
            name = %config.name,
            rules = config.rules.len(),
            targets = config.targets.len(),
            "Loaded scrape config"
        );
        Ok(config)
    }

    /// Writes the job as pretty JSON, or YAML for `.yaml`/`.yml` paths.
    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let content = if yaml {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "Saved scrape config");
        Ok(())
    }

    /// Checks numeric ranges and cross-references.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.concurrency == 0 {
            return Err(CoreError::config("concurrency must be at least 1"));
        }
        if !(self.fetch_timeout_secs.is_finite() && self.fetch_timeout_secs > 0.0) {
            return Err(CoreError::config("fetch_timeout_secs must be positive"));
        }

        for target in &self.targets {
            Url::parse(target)
                .map_err(|e| CoreError::config(format!("Invalid target URL '{target}': {e}")))?;
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name()) {
                return Err(CoreError::config(format!(
                    "Duplicate rule name '{}'",
                    rule.name()
                )));
            }
        }

        self.rate_limit.validate()?;
        self.retry.validate()?;
        self.pagination.validate(&self.rules)
    }

    /// Per-attempt fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        secs(self.fetch_timeout_secs)
    }
}

/// Converts validated seconds to a duration, saturating on bad input.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn non_negative(value: f64, field: &str) -> Result<(), CoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::config(format!("{field} must be a non-negative number")))
    }
}

// ============================================================================
// Rate Limit Config
// ============================================================================

/// Token-bucket rate limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether requests are rate limited.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Refill rate in tokens per second.
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    /// Bucket capacity.
    #[serde(default = "default_burst")]
    pub burst_size: u32,
    /// Response header carrying an upstream retry-after hint.
    #[serde(default = "default_retry_after_header")]
    pub retry_after_header: String,
}

fn default_rps() -> f64 {
    10.0
}

fn default_burst() -> u32 {
    10
}

fn default_retry_after_header() -> String {
    "Retry-After".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
            retry_after_header: default_retry_after_header(),
        }
    }
}

impl RateLimitConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.requests_per_second.is_finite() && self.requests_per_second > 0.0) {
            return Err(CoreError::config("rate_limit.requests_per_second must be positive"));
        }
        if self.burst_size == 0 {
            return Err(CoreError::config("rate_limit.burst_size must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Retry Config
// ============================================================================

/// Retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether failed attempts are retried.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total attempts per target, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
    /// Upper bound on computed delays, in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
    /// Add up to 10% random extra delay to computed backoff.
    #[serde(default)]
    pub jitter: bool,
    /// HTTP status codes treated as transient.
    #[serde(default = "default_retry_statuses")]
    pub retry_on_status_codes: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 502, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter: false,
            retry_on_status_codes: default_retry_statuses(),
        }
    }
}

impl RetryConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_attempts == 0 {
            return Err(CoreError::config("retry.max_attempts must be at least 1"));
        }
        non_negative(self.initial_delay, "retry.initial_delay")?;
        non_negative(self.max_delay, "retry.max_delay")?;
        if !(self.exponential_base.is_finite() && self.exponential_base >= 1.0) {
            return Err(CoreError::config("retry.exponential_base must be at least 1.0"));
        }
        Ok(())
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        secs(self.initial_delay)
    }

    /// Cap on computed delays.
    pub fn max_delay(&self) -> Duration {
        secs(self.max_delay)
    }
}

// ============================================================================
// Pagination Config
// ============================================================================

/// How the next page's URL is built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationMode {
    /// Increment a numeric offset query parameter.
    Offset {
        /// Query parameter name.
        #[serde(default = "default_offset_param")]
        param: String,
        /// Offset of the first page.
        #[serde(default)]
        start: u64,
        /// Increment per page.
        #[serde(default = "default_offset_step")]
        step: u64,
    },
    /// Increment a page-number query parameter.
    Page {
        /// Query parameter name.
        #[serde(default = "default_page_param")]
        param: String,
        /// Number of the first page.
        #[serde(default = "default_page_start")]
        start: u64,
    },
    /// Carry an opaque cursor extracted from each page.
    Cursor {
        /// Query parameter name.
        #[serde(default = "default_cursor_param")]
        param: String,
    },
    /// Follow the URL extracted from each page.
    #[default]
    Link,
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_offset_step() -> u64 {
    20
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_page_start() -> u64 {
    1
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

impl PaginationMode {
    /// Short mode name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offset { .. } => "offset",
            Self::Page { .. } => "page",
            Self::Cursor { .. } => "cursor",
            Self::Link => "link",
        }
    }
}

/// Pagination settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Whether `scrape` follows pagination.
    #[serde(default)]
    pub enabled: bool,
    /// URL construction mode.
    #[serde(default)]
    pub mode: PaginationMode,
    /// Upper bound on pages per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    /// Rule producing the next-page pointer (URL, cursor, or presence flag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<ExtractionRule>,
    /// Name of the rule whose item count drives stall detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_rule: Option<String>,
    /// Stop when the raw page body contains this text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_condition: Option<String>,
}

impl PaginationConfig {
    /// Checks the mode and cross-references against the job's rules.
    pub fn validate(&self, rules: &[ExtractionRule]) -> Result<(), CoreError> {
        if self.max_pages == Some(0) {
            return Err(CoreError::config("pagination.max_pages must be at least 1"));
        }
        if let PaginationMode::Offset { step: 0, .. } = self.mode {
            return Err(CoreError::config("pagination offset step must be at least 1"));
        }
        if matches!(self.mode, PaginationMode::Link | PaginationMode::Cursor { .. })
            && self.enabled
            && self.next_page.is_none()
        {
            return Err(CoreError::config(format!(
                "pagination mode '{}' requires a next_page rule",
                self.mode.as_str()
            )));
        }
        if let Some(items) = &self.items_rule {
            if !rules.iter().any(|r| r.name() == items) {
                return Err(CoreError::config(format!(
                    "pagination.items_rule '{items}' does not name a rule"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
