//! Parsing backends.
//!
//! A [`Backend`] wraps one parsed payload and answers locator queries with an
//! ordered sequence of [`Node`]s. The resolver only ever talks to these two
//! traits, so backends can be swapped without touching resolution logic.
//!
//! | Backend | Kind | Locators |
//! |---------|------|----------|
//! | [`ScraperBackend`] | HTML | CSS, XPath, regex, JSONPath (over JSON-LD) |
//! | [`JsonBackend`] | JSON | JSONPath, regex |

mod html;
mod json;
mod structure;
pub mod jsonpath;
pub mod xpath;

pub use html::ScraperBackend;
pub use json::{JsonBackend, JsonNode};

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::error::CoreError;
use crate::models::{ContentKind, Form, Image, Link, Locator, PageMetadata, Table};

// ============================================================================
// Node
// ============================================================================

/// A single match produced by a backend query.
pub trait Node {
    /// Trimmed text content.
    fn text(&self) -> String;

    /// Markup (or serialized JSON) of the node.
    fn html(&self) -> String;

    /// Value of a named attribute, if present.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Structured value for nodes that carry one (JSON).
    fn structured(&self) -> Option<Value> {
        None
    }

    /// Returns true for nodes that hold an explicit null (JSON).
    fn is_null(&self) -> bool {
        false
    }
}

/// A node holding a plain string (regex matches, text nodes, attribute values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode(pub String);

impl Node for TextNode {
    fn text(&self) -> String {
        self.0.clone()
    }

    fn html(&self) -> String {
        self.0.clone()
    }

    fn attribute(&self, _name: &str) -> Option<String> {
        None
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Boxed node borrowed from a backend.
pub type NodeRef<'a> = Box<dyn Node + 'a>;

/// Uniform query contract over one parsed payload.
///
/// Backends are immutable after construction: querying never changes what a
/// later query returns.
pub trait Backend {
    /// Backend name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Content kind this backend parsed.
    fn kind(&self) -> ContentKind;

    /// The raw payload text.
    fn source(&self) -> &str;

    /// Runs a locator, returning matches in document order.
    ///
    /// Locators the backend cannot answer fail with
    /// [`CoreError::KindMismatch`]. An empty payload yields no matches.
    fn query<'a>(&'a self, locator: &Locator) -> Result<Vec<NodeRef<'a>>, CoreError>;

    /// Page metadata, for backends that have any.
    fn metadata(&self, _base_url: Option<&Url>) -> Option<PageMetadata> {
        None
    }

    /// Hyperlinks, for backends that have any.
    fn links(&self, _base_url: Option<&Url>) -> Vec<Link> {
        Vec::new()
    }

    /// Images, for backends that have any.
    fn images(&self, _base_url: Option<&Url>) -> Vec<Image> {
        Vec::new()
    }

    /// Tables with at least one row.
    fn tables(&self) -> Vec<Table> {
        Vec::new()
    }

    /// Forms and their fields.
    fn forms(&self) -> Vec<Form> {
        Vec::new()
    }

    /// Top-level microdata items keyed by item type.
    fn microdata(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }
}

/// Runs a regex over text, yielding group 1 when the pattern has groups and
/// the whole match otherwise.
pub fn regex_matches(text: &str, regex: &Regex) -> Vec<String> {
    let group = usize::from(regex.captures_len() > 1);
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(group).map(|m| m.as_str().to_string()))
        .collect()
}

/// First regex match in `text`, using the same group rule as [`regex_matches`].
pub fn regex_first(text: &str, regex: &Regex) -> Option<String> {
    let group = usize::from(regex.captures_len() > 1);
    regex
        .captures(text)
        .and_then(|caps| caps.get(group).map(|m| m.as_str().to_string()))
}

pub(crate) fn kind_mismatch(locator: &Locator, kind: ContentKind) -> CoreError {
    CoreError::KindMismatch {
        locator: locator.to_string(),
        kind,
    }
}
