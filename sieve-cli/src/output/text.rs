//! Text output formatting with colors.

use serde_json::Value;
use sieve_core::{ExtractionResult, ExtractionRule, ScrapeConfig, StructuredData, TableRow};
use sieve_fetch::{
    Failure, PageResult, PaginatedRun, ScrapeOutcome, SitemapCollection, StatsSnapshot,
};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Values longer than this are cut in text output.
const MAX_VALUE_WIDTH: usize = 120;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    max_value_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            max_value_width: MAX_VALUE_WIDTH,
        }
    }

    /// Formats one batch outcome.
    pub fn format_outcome(&self, index: usize, outcome: &ScrapeOutcome) -> String {
        match outcome {
            Ok(page) => self.format_page(index, page),
            Err(failure) => self.format_failure(index, failure),
        }
    }

    /// Formats an extracted page with its values.
    pub fn format_page(&self, index: usize, page: &PageResult) -> String {
        let mut lines = vec![format!(
            "{} {} {} {}",
            self.green("✓"),
            self.dim(&format!("[{index}]")),
            self.bold(&page.url),
            self.dim(&format!(
                "({}, {} attempt{})",
                page.status,
                page.attempts,
                plural(page.attempts)
            )),
        )];
        lines.extend(self.format_values(&page.result, "    "));
        lines.join("\n")
    }

    /// Formats a failed target.
    pub fn format_failure(&self, index: usize, failure: &Failure) -> String {
        format!(
            "{} {} {} {}\n    {}",
            self.red("✗"),
            self.dim(&format!("[{index}]")),
            self.bold(&failure.target),
            self.red(&format!(
                "{} after {} attempt{}",
                failure.error_kind,
                failure.attempts_made,
                plural(failure.attempts_made)
            )),
            failure.message
        )
    }

    /// Formats a pagination run.
    pub fn format_run(&self, run: &PaginatedRun) -> String {
        let status = format!(
            "{} page{}, {} item{}, {}",
            run.pages.len(),
            plural(run.pages.len()),
            run.total_items(),
            plural(run.total_items()),
            run.termination
        );
        let status = if run.termination.is_clean() {
            self.green(&status)
        } else {
            self.yellow(&status)
        };

        let mut lines = vec![format!("{} - {}", self.bold(&run.start), status)];
        for (index, page) in run.pages.iter().enumerate() {
            lines.push(self.format_page(index, page));
        }
        if let Some(failure) = &run.failure {
            lines.push(self.format_failure(run.pages.len(), failure));
        }
        lines.join("\n")
    }

    /// Formats a local extraction, with the page structure when requested.
    pub fn format_extraction(
        &self,
        source: &str,
        result: &ExtractionResult,
        structure: Option<&StructuredData>,
    ) -> String {
        let mut lines = vec![self.bold(source)];
        lines.extend(self.format_values(result, "  "));
        for name in &result.missing_required {
            lines.push(format!("  {}: {}", name, self.red("missing (required)")));
        }
        if let Some(structure) = structure {
            self.format_structure(structure, &mut lines);
        }
        lines.join("\n")
    }

    fn format_structure(&self, page: &StructuredData, lines: &mut Vec<String>) {
        if let Some(meta) = page.metadata.as_ref().filter(|m| !m.is_empty()) {
            lines.push(String::new());
            lines.push(self.bold("Metadata"));
            let fields = [
                ("Title", &meta.title),
                ("Description", &meta.description),
                ("Author", &meta.author),
                ("Language", &meta.language),
                ("Canonical", &meta.canonical_url),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    lines.push(format!("  {:<12} {}", format!("{label}:"), value));
                }
            }
            if !meta.keywords.is_empty() {
                lines.push(format!("  {:<12} {}", "Keywords:", meta.keywords.join(", ")));
            }
            for (key, value) in &meta.open_graph {
                lines.push(format!("  {:<12} {}", format!("og:{key}"), self.dim(value)));
            }
            if !meta.json_ld.is_empty() {
                lines.push(format!("  {:<12} {} block(s)", "JSON-LD:", meta.json_ld.len()));
            }
        }

        if !page.links.is_empty() {
            lines.push(String::new());
            lines.push(self.bold(&format!("Links ({})", page.links.len())));
            for link in &page.links {
                let text = if link.text.is_empty() {
                    String::new()
                } else {
                    format!(" {}", self.dim(&link.text))
                };
                lines.push(format!("  {}{}", self.cyan(&link.url), text));
            }
        }

        if !page.images.is_empty() {
            lines.push(String::new());
            lines.push(self.bold(&format!("Images ({})", page.images.len())));
            for image in &page.images {
                let alt = if image.alt.is_empty() {
                    String::new()
                } else {
                    format!(" {}", self.dim(&image.alt))
                };
                lines.push(format!("  {}{}", self.cyan(&image.src), alt));
            }
        }

        for (i, table) in page.tables.iter().enumerate() {
            lines.push(String::new());
            lines.push(self.bold(&format!(
                "Table {} ({} row{})",
                i + 1,
                table.rows.len(),
                plural(table.rows.len())
            )));
            if !table.headers.is_empty() {
                lines.push(format!("  {}", self.dim(&table.headers.join(" | "))));
            }
            for row in &table.rows {
                let cells: Vec<&str> = match row {
                    TableRow::Keyed(cells) => cells.values().map(String::as_str).collect(),
                    TableRow::Cells(cells) => cells.iter().map(String::as_str).collect(),
                };
                lines.push(format!("  {}", cells.join(" | ")));
            }
        }

        for form in &page.forms {
            lines.push(String::new());
            let action = if form.action.is_empty() { "(self)" } else { &form.action };
            lines.push(format!(
                "{} {} {}",
                self.bold("Form"),
                form.method.to_ascii_uppercase(),
                self.cyan(action)
            ));
            for field in &form.fields {
                let name = field.name.as_deref().unwrap_or("-");
                let required = if field.required { self.yellow(" required") } else { String::new() };
                lines.push(format!("  {name} {}{required}", self.dim(&field.kind)));
            }
        }

        if !page.microdata.is_empty() {
            lines.push(String::new());
            lines.push(self.bold("Microdata"));
            for (kind, items) in &page.microdata {
                let count = items.as_array().map_or(1, Vec::len);
                lines.push(format!("  {kind} ({count})"));
            }
        }
    }

    /// Formats the URLs collected from a sitemap. With `list` off only the
    /// summary is shown.
    pub fn format_sitemap(&self, collection: &SitemapCollection, list: bool) -> String {
        let mut lines = vec![format!(
            "{} {} URL{} from {} sitemap{}",
            self.bold(&collection.root),
            collection.urls.len(),
            plural(collection.urls.len()),
            collection.sitemaps.len(),
            plural(collection.sitemaps.len())
        )];
        if list {
            for entry in &collection.urls {
                let lastmod = entry
                    .lastmod
                    .as_deref()
                    .map(|d| format!(" {}", self.dim(d)))
                    .unwrap_or_default();
                lines.push(format!("  {}{lastmod}", self.cyan(&entry.loc)));
            }
        }
        if collection.skipped > 0 {
            lines.push(format!(
                "  {}",
                self.yellow(&format!("{} nested sitemap(s) beyond max depth", collection.skipped))
            ));
        }
        for failure in &collection.failures {
            lines.push(format!(
                "  {} {} {}",
                self.red("✗"),
                failure.target,
                self.dim(&failure.message)
            ));
        }
        lines.join("\n")
    }

    /// Formats the job summary shown by `check`.
    pub fn format_check(&self, config: &ScrapeConfig) -> String {
        let mut lines = vec![format!("{} {}", self.green("✓"), self.bold(&config.name))];

        lines.push(format!(
            "  {} rule{}, {} target{}, concurrency {}",
            config.rules.len(),
            plural(config.rules.len()),
            config.targets.len(),
            plural(config.targets.len()),
            config.concurrency
        ));
        for rule in &config.rules {
            lines.push(format!("    {}", self.format_rule(rule)));
        }

        if config.rate_limit.enabled {
            lines.push(format!(
                "  Rate limit: {} req/s, burst {}",
                config.rate_limit.requests_per_second, config.rate_limit.burst_size
            ));
        } else {
            lines.push(format!("  Rate limit: {}", self.dim("off")));
        }

        if config.retry.enabled {
            lines.push(format!(
                "  Retry:      {} attempts, {}s initial, x{} backoff",
                config.retry.max_attempts, config.retry.initial_delay, config.retry.exponential_base
            ));
        } else {
            lines.push(format!("  Retry:      {}", self.dim("off")));
        }

        let pagination = &config.pagination;
        if pagination.enabled {
            let max = pagination
                .max_pages
                .map_or_else(|| "unbounded".to_string(), |m| format!("max {m} pages"));
            lines.push(format!("  Pagination: {} ({max})", pagination.mode.as_str()));
        } else {
            lines.push(format!("  Pagination: {}", self.dim("off")));
        }
        lines.join("\n")
    }

    /// Formats run statistics.
    pub fn format_stats(&self, stats: &StatsSnapshot) -> String {
        let failed = if stats.failures > 0 {
            self.red(&format!("{} failed", stats.failures))
        } else {
            format!("{} failed", stats.failures)
        };
        format!(
            "{} succeeded, {} | {} request{}, {} retr{}, {} rate limited, {}",
            stats.successes,
            failed,
            stats.requests,
            plural(stats.requests),
            stats.retries,
            if stats.retries == 1 { "y" } else { "ies" },
            stats.rate_limited,
            format_bytes(stats.bytes_received)
        )
    }

    fn format_rule(&self, rule: &ExtractionRule) -> String {
        let mut flags = Vec::new();
        if rule.is_multiple() {
            flags.push("multiple".to_string());
        }
        if rule.is_required() {
            flags.push("required".to_string());
        }
        if let Some(transform) = rule.transform() {
            flags.push(format!("| {transform}"));
        }
        format!(
            "{:<16} {} {}",
            self.cyan(rule.name()),
            rule.describe_locators(),
            self.dim(&flags.join(" "))
        )
        .trim_end()
        .to_string()
    }

    fn format_values(&self, result: &ExtractionResult, indent: &str) -> Vec<String> {
        result
            .values
            .iter()
            .map(|(name, value)| format!("{indent}{}: {}", self.cyan(name), self.format_value(value)))
            .collect()
    }

    /// Renders a value as compact JSON, cut to the width limit.
    pub fn format_value(&self, value: &Value) -> String {
        let rendered = match value {
            Value::Null => return self.dim("null"),
            other => other.to_string(),
        };
        if rendered.chars().count() <= self.max_value_width {
            rendered
        } else {
            let cut: String = rendered.chars().take(self.max_value_width).collect();
            format!("{cut}…")
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn plural<N: PartialEq + From<u8>>(n: N) -> &'static str {
    if n == N::from(1) { "" } else { "s" }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= 1_048_576.0 {
        format!("{:.1} MB", b / 1_048_576.0)
    } else if b >= 1_024.0 {
        format!("{:.1} KB", b / 1_024.0)
    } else {
        format!("{bytes} B")
    }
}
