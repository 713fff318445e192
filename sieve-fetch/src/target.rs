//! Fetch targets and raw responses.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sieve_core::ContentKind;
use url::Url;

use crate::error::FetchError;

// ============================================================================
// Fetch Target
// ============================================================================

/// One URL to fetch, plus per-target request headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTarget {
    /// URL to fetch.
    pub url: Url,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl FetchTarget {
    /// Creates a target without extra headers.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
        }
    }

    /// Parses a target URL.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        Url::parse(url)
            .map(Self::new)
            .map_err(|e| FetchError::InvalidTarget(format!("{url}: {e}")))
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl From<Url> for FetchTarget {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Raw Response
// ============================================================================

/// A fetched payload as returned by a [`Fetcher`](crate::Fetcher).
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Final URL after redirects.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Declared (or sniffed) content kind.
    pub content_kind: ContentKind,
}

impl RawResponse {
    /// Creates a response, sniffing the content kind from the body.
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        let content_kind = ContentKind::sniff(&body);
        Self {
            url,
            status,
            headers: BTreeMap::new(),
            body,
            content_kind,
        }
    }

    /// Adds a header. A `Content-Type` header also sets the content kind.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "content-type" {
            self.content_kind = ContentKind::detect(Some(&value), &self.body);
        }
        self.headers.insert(name, value);
        self
    }

    /// Sets the content kind explicitly.
    #[must_use]
    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.content_kind = kind;
        self
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the retry-after hint from the named header.
    pub fn retry_after(&self, header: &str) -> Option<Duration> {
        self.header(header)
            .and_then(|value| parse_retry_after(value, Utc::now()))
    }

    /// Converts non-success statuses into errors.
    ///
    /// 429 becomes [`FetchError::RateLimited`], 401/403 become
    /// [`FetchError::AuthenticationFailed`], anything else outside 2xx becomes
    /// [`FetchError::Status`].
    pub fn error_for_status(self, retry_after_header: &str) -> Result<Self, FetchError> {
        match self.status {
            s if (200..300).contains(&s) => Ok(self),
            429 => Err(FetchError::RateLimited {
                retry_after: self.retry_after(retry_after_header),
            }),
            401 | 403 => Err(FetchError::AuthenticationFailed(format!(
                "{} answered {}",
                self.url, self.status
            ))),
            status => Err(FetchError::Status {
                status,
                retry_after: self.retry_after(retry_after_header),
            }),
        }
    }
}

/// Parses a `Retry-After` value: delta-seconds (integer or fractional) or an
/// HTTP-date. Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<f64>() {
        // Out-of-range hints saturate so the retry policy can still cap them.
        return match Duration::try_from_secs_f64(secs) {
            Ok(delay) => Some(delay),
            Err(_) if secs.is_finite() && secs > 0.0 => Some(Duration::MAX),
            Err(_) => None,
        };
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 1.5 ", now), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-3", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_error_for_status_mapping() {
        let ok = RawResponse::new(url(), 200, "<p>ok</p>");
        assert!(ok.error_for_status("Retry-After").is_ok());

        let limited = RawResponse::new(url(), 429, "").with_header("Retry-After", "5");
        match limited.error_for_status("retry-after") {
            Err(FetchError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(5)));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        let denied = RawResponse::new(url(), 403, "");
        assert!(matches!(
            denied.error_for_status("Retry-After"),
            Err(FetchError::AuthenticationFailed(_))
        ));

        let missing = RawResponse::new(url(), 404, "");
        assert!(matches!(
            missing.error_for_status("Retry-After"),
            Err(FetchError::Status { status: 404, retry_after: None })
        ));
    }

    #[test]
    fn test_content_kind_from_header_or_body() {
        let sniffed = RawResponse::new(url(), 200, r#"{"a": 1}"#);
        assert_eq!(sniffed.content_kind, ContentKind::Json);

        let declared = RawResponse::new(url(), 200, "[]").with_header("Content-Type", "text/html");
        assert_eq!(declared.content_kind, ContentKind::Html);
        assert_eq!(declared.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_target_parse() {
        let target = FetchTarget::parse("https://example.com/a?b=1")
            .unwrap()
            .with_header("Accept", "text/html");
        assert_eq!(target.to_string(), "https://example.com/a?b=1");
        assert_eq!(target.headers.get("Accept").map(String::as_str), Some("text/html"));
        assert!(matches!(
            FetchTarget::parse("nope"),
            Err(FetchError::InvalidTarget(_))
        ));
    }
}
