//! Output formatting for CLI.

mod json;
mod text;

use std::io::Write;

use anyhow::Result;
use async_trait::async_trait;
use sieve_core::{ExtractionResult, ScrapeConfig, StructuredData};
use sieve_fetch::{
    FetchError, OutcomeSink, PaginatedRun, ScrapeOutcome, SitemapCollection, StatsSnapshot,
};

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::OutputFormat;

// ============================================================================
// Printer
// ============================================================================

/// Renders results in the selected format. Results go to stdout, stats to
/// stderr so JSON output stays machine-readable.
pub struct Printer {
    format: OutputFormat,
    text: TextFormatter,
    json: JsonFormatter,
}

impl Printer {
    /// Creates a printer for a format.
    pub fn new(format: OutputFormat, pretty: bool, use_colors: bool) -> Self {
        Self {
            format,
            text: TextFormatter::new(use_colors),
            json: JsonFormatter::new(pretty),
        }
    }

    /// Renders one batch outcome.
    pub fn render_outcome(&self, index: usize, outcome: &ScrapeOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_outcome(index, outcome)),
            OutputFormat::Json => self.json.format_outcome(index, outcome),
        }
    }

    /// Renders a pagination run.
    pub fn render_run(&self, run: &PaginatedRun) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_run(run)),
            OutputFormat::Json => self.json.format_run(run),
        }
    }

    /// Renders a local extraction.
    pub fn render_extraction(
        &self,
        source: &str,
        result: &ExtractionResult,
        structure: Option<&StructuredData>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_extraction(source, result, structure)),
            OutputFormat::Json => self.json.format_extraction(source, result, structure),
        }
    }

    /// Renders a sitemap collection; text output lists URLs only with `list`.
    pub fn render_sitemap(&self, collection: &SitemapCollection, list: bool) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_sitemap(collection, list)),
            OutputFormat::Json => self.json.format_sitemap(collection),
        }
    }

    /// Renders a validated job.
    pub fn render_check(&self, config: &ScrapeConfig) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_check(config)),
            OutputFormat::Json => self.json.format_check(config),
        }
    }

    /// Renders run statistics.
    pub fn render_stats(&self, stats: &StatsSnapshot) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.text.format_stats(stats)),
            OutputFormat::Json => self.json.format_stats(stats),
        }
    }

    /// Writes a rendered block to stdout.
    pub fn emit(&self, rendered: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{rendered}")?;
        out.flush()
    }

    /// Writes a rendered block to stderr.
    pub fn emit_err(&self, rendered: &str) -> std::io::Result<()> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "{rendered}")
    }
}

// ============================================================================
// Stdout Sink
// ============================================================================

/// Prints each outcome as soon as the orchestrator hands it over.
pub struct StdoutSink<'a> {
    printer: &'a Printer,
}

impl<'a> StdoutSink<'a> {
    /// Creates a sink printing through `printer`.
    pub fn new(printer: &'a Printer) -> Self {
        Self { printer }
    }
}

#[async_trait]
impl OutcomeSink for StdoutSink<'_> {
    async fn accept(&self, index: usize, outcome: &ScrapeOutcome) -> Result<(), FetchError> {
        let rendered = self
            .printer
            .render_outcome(index, outcome)
            .map_err(|e| FetchError::Internal(format!("rendering outcome {index}: {e}")))?;
        self.printer.emit(&rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
