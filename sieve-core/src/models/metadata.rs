//! Page metadata and links.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata found in an HTML document's head.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Content of `<title>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `<meta name="description">`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `<meta name="keywords">`, split on commas.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// `<meta name="author">`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// `lang` attribute of the root element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// `<link rel="canonical">`, resolved against the base URL when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// OpenGraph properties without the `og:` prefix.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub open_graph: IndexMap<String, String>,
    /// Twitter card properties without the `twitter:` prefix.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub twitter_card: IndexMap<String, String>,
    /// Parsed JSON-LD blocks in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_ld: Vec<Value>,
}

impl PageMetadata {
    /// Returns true if no metadata was found.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A hyperlink found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link target, absolute when the document has a base URL.
    pub url: String,
    /// Trimmed anchor text.
    pub text: String,
}
