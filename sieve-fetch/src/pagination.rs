//! Pagination state machine.
//!
//! One driver walks one pagination run. It never looks at the network: the
//! orchestrator asks it for the next URL, reports what happened to the page,
//! and the driver decides whether the run continues and where to.
//!
//! ```text
//! AwaitingFirstPage -> Fetching -> Extracting -> Continuing -> Fetching ...
//!                         |            |
//!                         +------------+--> Terminated(reason)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sieve_core::{PaginationConfig, PaginationMode};
use tracing::{debug, warn};
use url::Url;

/// Consecutive zero-item pages that count as a stall.
const STALL_THRESHOLD: u32 = 2;

// ============================================================================
// States
// ============================================================================

/// Why a pagination run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The next-page rule yielded nothing.
    NoNextPage,
    /// `max_pages` pages were collected.
    MaxPagesReached,
    /// Two pages in a row had no items, or a link pointed back at the page.
    Stalled,
    /// The page body contained the stop text.
    StopCondition,
    /// A page could not be fetched or extracted.
    PageFailed,
    /// The run was cancelled.
    Cancelled,
}

impl TerminationReason {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoNextPage => "no_next_page",
            Self::MaxPagesReached => "max_pages_reached",
            Self::Stalled => "stalled",
            Self::StopCondition => "stop_condition",
            Self::PageFailed => "page_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true when the run ended without an error.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Self::PageFailed | Self::Cancelled)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pagination run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Nothing fetched yet.
    AwaitingFirstPage,
    /// A page is in flight.
    Fetching,
    /// A page arrived and is being extracted.
    Extracting,
    /// The next target is ready.
    Continuing,
    /// The run is over.
    Terminated(TerminationReason),
}

/// What the orchestrator learned from one page.
#[derive(Debug, Clone, Copy)]
pub struct PageSignal<'a> {
    /// Value of the next-page rule, `None` when the job has no such rule.
    pub next: Option<&'a Value>,
    /// Items extracted from the page.
    pub item_count: usize,
    /// Raw page body.
    pub body: &'a [u8],
}

/// Mutable per-run state.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState {
    /// URL of the current (or next) page.
    pub current: Url,
    /// Pages extracted so far.
    pub pages_visited: u32,
    /// Zero-item pages in a row.
    pub consecutive_empty: u32,
    /// Offset or page number of the current page.
    pub position: u64,
    /// State machine position.
    pub state: PageState,
}

// ============================================================================
// Driver
// ============================================================================

/// Drives one pagination run.
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    mode: PaginationMode,
    max_pages: Option<u32>,
    has_next_rule: bool,
    stop_condition: Option<String>,
    state: PaginationState,
}

impl PaginationDriver {
    /// Starts a run at `start`. The first page is fetched verbatim.
    ///
    /// In offset and page modes a numeric value already present for the
    /// parameter on `start` seeds the position, so a run resumed from
    /// `?offset=40` continues at 40 + step.
    pub fn new(config: &PaginationConfig, start: Url) -> Self {
        let position = match &config.mode {
            PaginationMode::Offset { param, start: first, .. }
            | PaginationMode::Page { param, start: first, .. } => {
                query_position(&start, param).unwrap_or(*first)
            }
            PaginationMode::Cursor { .. } | PaginationMode::Link => 0,
        };
        Self {
            mode: config.mode.clone(),
            max_pages: config.max_pages,
            has_next_rule: config.next_page.is_some(),
            stop_condition: config.stop_condition.clone().filter(|s| !s.is_empty()),
            state: PaginationState {
                current: start,
                pages_visited: 0,
                consecutive_empty: 0,
                position,
                state: PageState::AwaitingFirstPage,
            },
        }
    }

    /// Current run state.
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Termination reason, once the run is over.
    pub fn termination(&self) -> Option<TerminationReason> {
        match self.state.state {
            PageState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns true once the run is over.
    pub fn is_terminated(&self) -> bool {
        self.termination().is_some()
    }

    /// Moves to `Fetching` and returns the URL to fetch, or `None` if the run
    /// is not waiting for a page.
    pub fn begin_fetch(&mut self) -> Option<Url> {
        match self.state.state {
            PageState::AwaitingFirstPage | PageState::Continuing => {
                self.state.state = PageState::Fetching;
                Some(self.state.current.clone())
            }
            _ => None,
        }
    }

    /// Records that the page arrived.
    pub fn on_fetched(&mut self) {
        if self.state.state == PageState::Fetching {
            self.state.state = PageState::Extracting;
        }
    }

    /// Ends the run early.
    pub fn on_failed(&mut self, reason: TerminationReason) {
        if !self.is_terminated() {
            self.state.state = PageState::Terminated(reason);
        }
    }

    /// Records an extracted page and decides whether the run continues.
    pub fn on_extracted(&mut self, signal: PageSignal<'_>) -> PageState {
        if self.state.state != PageState::Extracting {
            return self.state.state;
        }
        self.state.pages_visited += 1;

        if signal.item_count == 0 {
            self.state.consecutive_empty += 1;
        } else {
            self.state.consecutive_empty = 0;
        }

        let outcome = if self.stop_matches(signal.body) {
            Err(TerminationReason::StopCondition)
        } else if self.max_pages.is_some_and(|max| self.state.pages_visited >= max) {
            Err(TerminationReason::MaxPagesReached)
        } else if self.state.consecutive_empty >= STALL_THRESHOLD {
            Err(TerminationReason::Stalled)
        } else {
            self.next_url(signal.next)
        };

        self.state.state = match outcome {
            Ok(next) => {
                debug!(from = %self.state.current, to = %next, "Continuing pagination");
                self.state.current = next;
                PageState::Continuing
            }
            Err(reason) => PageState::Terminated(reason),
        };
        self.state.state
    }

    fn stop_matches(&self, body: &[u8]) -> bool {
        self.stop_condition.as_deref().is_some_and(|stop| {
            let needle = stop.as_bytes();
            body.windows(needle.len()).any(|w| w == needle)
        })
    }

    fn next_url(&mut self, next: Option<&Value>) -> Result<Url, TerminationReason> {
        let pointer = next.and_then(pointer_text);
        if self.has_next_rule && pointer.is_none() {
            return Err(TerminationReason::NoNextPage);
        }

        match &self.mode {
            PaginationMode::Offset { param, step, .. } => {
                self.state.position = self.state.position.saturating_add(*step);
                Ok(with_query_param(
                    &self.state.current,
                    param,
                    &self.state.position.to_string(),
                ))
            }
            PaginationMode::Page { param, .. } => {
                self.state.position = self.state.position.saturating_add(1);
                Ok(with_query_param(
                    &self.state.current,
                    param,
                    &self.state.position.to_string(),
                ))
            }
            PaginationMode::Cursor { param } => {
                let cursor = pointer.ok_or(TerminationReason::NoNextPage)?;
                Ok(with_query_param(&self.state.current, param, &cursor))
            }
            PaginationMode::Link => {
                let link = pointer.ok_or(TerminationReason::NoNextPage)?;
                let next = self.state.current.join(&link).map_err(|e| {
                    warn!(link = %link, error = %e, "Unusable next-page link");
                    TerminationReason::NoNextPage
                })?;
                if next == self.state.current {
                    return Err(TerminationReason::Stalled);
                }
                Ok(next)
            }
        }
    }
}

/// Reduces a next-page value to its text, treating empty values as absent.
fn pointer_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(pointer_text),
        Value::Object(_) => None,
    }
}

/// Numeric value of the first `name` parameter on a URL's query.
fn query_position(url: &Url, name: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| v.trim().parse().ok())
}

/// Sets `name=value` on a URL's query, replacing an existing value in place.
fn with_query_param(url: &Url, name: &str, value: &str) -> Url {
    let mut found = false;
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            if k != name {
                return Some((k.into_owned(), v.into_owned()));
            }
            if found {
                return None;
            }
            found = true;
            Some((k.into_owned(), value.to_string()))
        })
        .collect();
    if !found {
        pairs.push((name.to_string(), value.to_string()));
    }

    let mut next = url.clone();
    next.query_pairs_mut().clear().extend_pairs(pairs);
    next
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sieve_core::ExtractionRule;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn next_rule() -> Option<ExtractionRule> {
        Some(ExtractionRule::builder("next").selector("a.next").build().unwrap())
    }

    fn step(driver: &mut PaginationDriver, next: Option<&Value>, items: usize) -> PageState {
        driver.begin_fetch().unwrap();
        driver.on_fetched();
        driver.on_extracted(PageSignal {
            next,
            item_count: items,
            body: b"<html></html>",
        })
    }

    #[test]
    fn test_offset_mode_increments_param() {
        let config = PaginationConfig {
            enabled: true,
            mode: PaginationMode::Offset {
                param: "offset".into(),
                start: 0,
                step: 20,
            },
            next_page: next_rule(),
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://api.example/items?q=lamp"));
        let more = json!("more");

        assert_eq!(step(&mut driver, Some(&more), 20), PageState::Continuing);
        assert_eq!(
            driver.state().current.as_str(),
            "https://api.example/items?q=lamp&offset=20"
        );
        assert_eq!(step(&mut driver, Some(&more), 20), PageState::Continuing);
        assert_eq!(
            driver.state().current.as_str(),
            "https://api.example/items?q=lamp&offset=40"
        );
        assert_eq!(
            step(&mut driver, Some(&Value::Null), 5),
            PageState::Terminated(TerminationReason::NoNextPage)
        );
        assert_eq!(driver.state().pages_visited, 3);
        assert!(driver.begin_fetch().is_none());
    }

    #[test]
    fn test_page_mode_replaces_existing_param() {
        let config = PaginationConfig {
            mode: PaginationMode::Page {
                param: "page".into(),
                start: 1,
            },
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://x.example/?page=1&sort=new"));

        step(&mut driver, None, 3);
        assert_eq!(driver.state().current.as_str(), "https://x.example/?page=2&sort=new");
    }

    #[test]
    fn test_offset_in_start_url_seeds_position() {
        let config = PaginationConfig {
            mode: PaginationMode::Offset {
                param: "offset".into(),
                start: 0,
                step: 20,
            },
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://api.example/items?offset=40&q=lamp"));
        assert_eq!(driver.state().position, 40);

        step(&mut driver, None, 20);
        assert_eq!(
            driver.state().current.as_str(),
            "https://api.example/items?offset=60&q=lamp"
        );

        let page = PaginationConfig {
            mode: PaginationMode::Page {
                param: "page".into(),
                start: 1,
            },
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&page, url("https://x.example/?page=7"));
        step(&mut driver, None, 3);
        assert_eq!(driver.state().current.as_str(), "https://x.example/?page=8");

        let junk = PaginationDriver::new(&config, url("https://api.example/items?offset=abc"));
        assert_eq!(junk.state().position, 0);
    }

    #[test]
    fn test_link_mode_resolves_relative_links() {
        let config = PaginationConfig {
            next_page: next_rule(),
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://blog.example/posts/"));

        step(&mut driver, Some(&json!("?page=2")), 1);
        assert_eq!(driver.state().current.as_str(), "https://blog.example/posts/?page=2");
        step(&mut driver, Some(&json!("/archive/3")), 1);
        assert_eq!(driver.state().current.as_str(), "https://blog.example/archive/3");
    }

    #[test]
    fn test_link_to_same_page_is_a_stall() {
        let config = PaginationConfig {
            next_page: next_rule(),
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://blog.example/last"));

        assert_eq!(
            step(&mut driver, Some(&json!("/last")), 4),
            PageState::Terminated(TerminationReason::Stalled)
        );
    }

    #[test]
    fn test_cursor_mode_carries_token() {
        let config = PaginationConfig {
            mode: PaginationMode::Cursor {
                param: "after".into(),
            },
            next_page: next_rule(),
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://api.example/feed"));

        step(&mut driver, Some(&json!("abc123")), 10);
        assert_eq!(driver.state().current.as_str(), "https://api.example/feed?after=abc123");
        step(&mut driver, Some(&json!("def456")), 10);
        assert_eq!(driver.state().current.as_str(), "https://api.example/feed?after=def456");
    }

    #[test]
    fn test_two_empty_pages_stall() {
        let config = PaginationConfig {
            mode: PaginationMode::Page {
                param: "p".into(),
                start: 1,
            },
            ..PaginationConfig::default()
        };
        let mut driver = PaginationDriver::new(&config, url("https://x.example/"));

        assert_eq!(step(&mut driver, None, 0), PageState::Continuing);
        assert_eq!(step(&mut driver, None, 3), PageState::Continuing);
        assert_eq!(step(&mut driver, None, 0), PageState::Continuing);
        assert_eq!(
            step(&mut driver, None, 0),
            PageState::Terminated(TerminationReason::Stalled)
        );
        assert_eq!(driver.state().pages_visited, 4);
    }

    #[test]
    fn test_max_pages_and_stop_condition() {
        let config = PaginationConfig {
            mode: PaginationMode::Page {
                param: "p".into(),
                start: 1,
            },
            max_pages: Some(2),
            stop_condition: Some("No more results".into()),
            ..PaginationConfig::default()
        };

        let mut driver = PaginationDriver::new(&config, url("https://x.example/"));
        step(&mut driver, None, 1);
        assert_eq!(
            step(&mut driver, None, 1),
            PageState::Terminated(TerminationReason::MaxPagesReached)
        );

        let mut driver = PaginationDriver::new(&config, url("https://x.example/"));
        driver.begin_fetch();
        driver.on_fetched();
        let state = driver.on_extracted(PageSignal {
            next: None,
            item_count: 1,
            body: b"<p>No more results</p>",
        });
        assert_eq!(state, PageState::Terminated(TerminationReason::StopCondition));
    }

    #[test]
    fn test_failure_terminates_once() {
        let mut driver =
            PaginationDriver::new(&PaginationConfig::default(), url("https://x.example/"));
        driver.begin_fetch();
        driver.on_failed(TerminationReason::PageFailed);
        driver.on_failed(TerminationReason::Cancelled);

        assert_eq!(driver.termination(), Some(TerminationReason::PageFailed));
        assert!(!TerminationReason::PageFailed.is_clean());
        assert!(TerminationReason::NoNextPage.is_clean());
    }

    #[test]
    fn test_pointer_text() {
        assert_eq!(pointer_text(&json!("  ")), None);
        assert_eq!(pointer_text(&json!(false)), None);
        assert_eq!(pointer_text(&json!(42)), Some("42".into()));
        assert_eq!(pointer_text(&json!(["", "/b"])), Some("/b".into()));
    }
}
