//! Sitemap collection.
//!
//! Walks a sitemap and, for a sitemap index, the sitemaps it lists. Each
//! document is fetched through the orchestrator, so the rate limit, retry
//! policy, and cancellation apply exactly as they do to scraped pages.
//! Index entries are expanded depth-first in document order, which keeps
//! the collected URLs in the order a reader of the files would see them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sieve_core::sitemap::{Sitemap, SitemapEntry, parse_sitemap};
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, FetchError};
use crate::orchestrator::Orchestrator;
use crate::outcome::Failure;
use crate::target::FetchTarget;

/// How many index levels below the root are followed by default.
pub const DEFAULT_SITEMAP_DEPTH: u32 = 3;

/// Page URLs gathered from a sitemap tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitemapCollection {
    /// The sitemap the walk started from.
    pub root: String,
    /// Page entries in discovery order, first occurrence of each URL kept.
    pub urls: Vec<SitemapEntry>,
    /// Sitemap documents read, in fetch order.
    pub sitemaps: Vec<String>,
    /// Child sitemaps that could not be fetched or parsed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
    /// Index entries not followed because they were too deep.
    #[serde(default)]
    pub skipped: usize,
}

impl SitemapCollection {
    /// Page URLs only.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(|e| e.loc.as_str())
    }

    /// Turns the page URLs into fetch targets, dropping unparsable ones.
    pub fn targets(&self) -> Vec<FetchTarget> {
        self.locations()
            .filter_map(|loc| match FetchTarget::parse(loc) {
                Ok(target) => Some(target),
                Err(e) => {
                    warn!(loc, error = %e, "Skipping sitemap entry");
                    None
                }
            })
            .collect()
    }
}

impl Orchestrator {
    /// Collects page URLs from the sitemap at `root`.
    ///
    /// A sitemap index is followed up to `max_depth` levels below the root;
    /// deeper entries are counted in [`SitemapCollection::skipped`]. A
    /// sitemap listed twice is read once. Failing to read the root is an
    /// error; failing to read a child is recorded and the walk continues.
    pub async fn collect_sitemap(
        &self,
        root: &FetchTarget,
        max_depth: u32,
    ) -> Result<SitemapCollection, Failure> {
        info!(root = %root, max_depth, "Collecting sitemap");
        let mut collection = SitemapCollection {
            root: root.to_string(),
            ..SitemapCollection::default()
        };
        let mut seen_sitemaps: HashSet<String> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut stack = vec![(root.clone(), 0u32)];

        while let Some((target, depth)) = stack.pop() {
            if !seen_sitemaps.insert(target.url.to_string()) {
                debug!(sitemap = %target, "Sitemap already read");
                continue;
            }

            let sitemap = match self.read_sitemap(&target).await {
                Ok(sitemap) => sitemap,
                Err(failure) if depth == 0 => return Err(failure),
                Err(failure) => {
                    warn!(sitemap = %target, error = %failure.message, "Skipping unreadable sitemap");
                    let cancelled = failure.error_kind == ErrorKind::Cancelled;
                    collection.failures.push(failure);
                    if cancelled {
                        break;
                    }
                    continue;
                }
            };
            collection.sitemaps.push(target.to_string());

            match sitemap {
                Sitemap::UrlSet(entries) => {
                    debug!(sitemap = %target, urls = entries.len(), "Read url set");
                    collection
                        .urls
                        .extend(entries.into_iter().filter(|e| seen_urls.insert(e.loc.clone())));
                }
                Sitemap::Index(entries) => {
                    if depth >= max_depth {
                        warn!(sitemap = %target, entries = entries.len(), "Sitemap index too deep");
                        collection.skipped += entries.len();
                        continue;
                    }
                    let children: Vec<_> = entries
                        .iter()
                        .filter_map(|e| match target.url.join(&e.loc) {
                            Ok(url) => Some(FetchTarget {
                                url,
                                headers: target.headers.clone(),
                            }),
                            Err(err) => {
                                warn!(loc = %e.loc, error = %err, "Skipping sitemap index entry");
                                None
                            }
                        })
                        .collect();
                    stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
                }
            }
        }

        info!(
            urls = collection.urls.len(),
            sitemaps = collection.sitemaps.len(),
            failures = collection.failures.len(),
            "Sitemap collected"
        );
        Ok(collection)
    }

    async fn read_sitemap(&self, target: &FetchTarget) -> Result<Sitemap, Failure> {
        let (response, attempts) = self.fetch(target).await?;
        let parse_failure = |err: FetchError| Failure::from_error(target, &err, attempts);
        let body = std::str::from_utf8(&response.body).map_err(|e| {
            parse_failure(FetchError::Core(sieve_core::CoreError::Parse {
                backend: "quick-xml",
                snippet_len: response.body.len(),
                reason: format!("invalid UTF-8: {e}"),
            }))
        })?;
        parse_sitemap(body).map_err(|e| parse_failure(FetchError::Core(e)))
    }
}
