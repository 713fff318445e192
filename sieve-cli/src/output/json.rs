//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sieve_core::{ExtractionResult, ScrapeConfig, StructuredData};
use sieve_fetch::{
    ErrorKind, Failure, PageResult, PaginatedRun, ScrapeOutcome, SitemapCollection, StatsSnapshot,
};

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one scraped target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeOutput<'a> {
    pub index: usize,
    pub target: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput<'a>>,
}

/// Error details for a failed target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput<'a> {
    pub kind: ErrorKind,
    pub message: &'a str,
}

/// JSON output for a pagination run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput<'a> {
    pub start: &'a str,
    pub termination: String,
    pub clean: bool,
    pub total_items: usize,
    pub pages: Vec<OutcomeOutput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OutcomeOutput<'a>>,
}

/// JSON output for a local extraction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOutput<'a> {
    pub source: &'a str,
    pub data: Value,
    pub missing_required: Vec<&'a str>,
    #[serde(flatten)]
    pub structure: Option<&'a StructuredData>,
}

/// JSON output for `sitemap`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapOutput<'a> {
    pub root: &'a str,
    pub count: usize,
    pub urls: Vec<&'a str>,
    pub sitemaps: &'a [String],
    #[serde(skip_serializing_if = "<[Failure]>::is_empty")]
    pub failures: &'a [Failure],
    pub skipped: usize,
}

/// JSON output for `check`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutput<'a> {
    pub name: &'a str,
    pub valid: bool,
    pub rules: Vec<&'a str>,
    pub targets: usize,
    pub concurrency: usize,
    pub rate_limited: bool,
    pub retries: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<&'static str>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats one batch outcome.
    pub fn format_outcome(&self, index: usize, outcome: &ScrapeOutcome) -> Result<String> {
        self.format(&outcome_output(index, outcome))
    }

    /// Formats a pagination run.
    pub fn format_run(&self, run: &PaginatedRun) -> Result<String> {
        let output = RunOutput {
            start: &run.start,
            termination: run.termination.to_string(),
            clean: run.termination.is_clean(),
            total_items: run.total_items(),
            pages: run
                .pages
                .iter()
                .enumerate()
                .map(|(index, page)| page_output(index, page))
                .collect(),
            failure: run
                .failure
                .as_ref()
                .map(|failure| failure_output(run.pages.len(), failure)),
        };
        self.format(&output)
    }

    /// Formats a local extraction.
    pub fn format_extraction(
        &self,
        source: &str,
        result: &ExtractionResult,
        structure: Option<&StructuredData>,
    ) -> Result<String> {
        let output = ExtractOutput {
            source,
            data: result.to_json(),
            missing_required: result.missing_required.iter().map(String::as_str).collect(),
            structure,
        };
        self.format(&output)
    }

    /// Formats the URLs collected from a sitemap.
    pub fn format_sitemap(&self, collection: &SitemapCollection) -> Result<String> {
        let output = SitemapOutput {
            root: &collection.root,
            count: collection.urls.len(),
            urls: collection.locations().collect(),
            sitemaps: &collection.sitemaps,
            failures: &collection.failures,
            skipped: collection.skipped,
        };
        self.format(&output)
    }

    /// Formats the job summary shown by `check`.
    pub fn format_check(&self, config: &ScrapeConfig) -> Result<String> {
        let output = CheckOutput {
            name: &config.name,
            valid: true,
            rules: config.rules.iter().map(|r| r.name()).collect(),
            targets: config.targets.len(),
            concurrency: config.concurrency,
            rate_limited: config.rate_limit.enabled,
            retries: config.retry.enabled,
            pagination: config
                .pagination
                .enabled
                .then(|| config.pagination.mode.as_str()),
        };
        self.format(&output)
    }

    /// Formats run statistics.
    pub fn format_stats(&self, stats: &StatsSnapshot) -> Result<String> {
        self.format(stats)
    }
}

fn outcome_output(index: usize, outcome: &ScrapeOutcome) -> OutcomeOutput<'_> {
    match outcome {
        Ok(page) => page_output(index, page),
        Err(failure) => failure_output(index, failure),
    }
}

fn page_output(index: usize, page: &PageResult) -> OutcomeOutput<'_> {
    OutcomeOutput {
        index,
        target: &page.target,
        ok: true,
        url: Some(&page.url),
        status: Some(page.status),
        attempts: page.attempts,
        data: Some(page.result.to_json()),
        error: None,
    }
}

fn failure_output(index: usize, failure: &Failure) -> OutcomeOutput<'_> {
    OutcomeOutput {
        index,
        target: &failure.target,
        ok: false,
        url: None,
        status: None,
        attempts: failure.attempts_made,
        data: None,
        error: Some(ErrorOutput {
            kind: failure.error_kind,
            message: &failure.message,
        }),
    }
}
