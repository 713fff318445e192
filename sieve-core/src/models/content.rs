//! Payload content kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Content Kind
// ============================================================================

/// Declared kind of a fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// HTML (or XHTML) markup.
    #[default]
    Html,
    /// A JSON value.
    Json,
}

impl ContentKind {
    /// Maps a `Content-Type` header value to a content kind.
    ///
    /// Returns `None` for types that say nothing useful (e.g. `text/plain`).
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") || mime == "text/json" {
            Some(Self::Json)
        } else if mime.contains("html") || mime.ends_with("+xml") || mime.ends_with("/xml") {
            Some(Self::Html)
        } else {
            None
        }
    }

    /// Guesses the kind from the first non-whitespace byte of a payload.
    pub fn sniff(body: &[u8]) -> Self {
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{' | b'[') => Self::Json,
            _ => Self::Html,
        }
    }

    /// Resolves the kind from an optional header, falling back to sniffing.
    pub fn detect(content_type: Option<&str>, body: &[u8]) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .unwrap_or_else(|| Self::sniff(body))
    }

    /// Lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
