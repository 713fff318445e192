//! Parsed documents.
//!
//! A [`Document`] owns exactly one backend tree for its whole lifetime and is
//! never mutated after construction. Switching backends means parsing again.

use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

use crate::backend::{Backend, JsonBackend, NodeRef, ScraperBackend};
use crate::error::CoreError;
use crate::models::{
    ContentKind, Form, Image, Link, Locator, PageMetadata, StructuredData, Table,
};

/// One fetched payload, parsed by the backend matching its content kind.
pub struct Document {
    backend: Box<dyn Backend>,
    base_url: Option<Url>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("backend", &self.backend.name())
            .field("kind", &self.backend.kind())
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl Document {
    /// Parses a payload of the given kind.
    pub fn parse(body: impl Into<String>, kind: ContentKind) -> Result<Self, CoreError> {
        let backend: Box<dyn Backend> = match kind {
            ContentKind::Html => Box::new(ScraperBackend::parse(body)),
            ContentKind::Json => Box::new(JsonBackend::parse(body)?),
        };
        Ok(Self::from_backend(backend))
    }

    /// Parses an HTML payload.
    pub fn html(body: impl Into<String>) -> Self {
        Self::from_backend(Box::new(ScraperBackend::parse(body)))
    }

    /// Parses a JSON payload.
    pub fn json(body: impl Into<String>) -> Result<Self, CoreError> {
        Ok(Self::from_backend(Box::new(JsonBackend::parse(body)?)))
    }

    /// Parses raw bytes, which must be valid UTF-8.
    pub fn from_bytes(body: &[u8], kind: ContentKind) -> Result<Self, CoreError> {
        let text = std::str::from_utf8(body).map_err(|e| CoreError::Parse {
            backend: match kind {
                ContentKind::Html => ScraperBackend::NAME,
                ContentKind::Json => JsonBackend::NAME,
            },
            snippet_len: body.len(),
            reason: format!("payload is not valid UTF-8: {e}"),
        })?;
        Self::parse(text, kind)
    }

    /// Wraps an already-constructed backend.
    pub fn from_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            base_url: None,
        }
    }

    /// Sets the URL relative links and `to-absolute-url` resolve against.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Runs a locator through the backend.
    pub fn query(&self, locator: &Locator) -> Result<Vec<NodeRef<'_>>, CoreError> {
        self.backend.query(locator)
    }

    /// The raw payload text.
    pub fn source(&self) -> &str {
        self.backend.source()
    }

    /// Content kind of the payload.
    pub fn kind(&self) -> ContentKind {
        self.backend.kind()
    }

    /// Name of the backend that parsed the payload.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Base URL, if one was set.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Page metadata (HTML only).
    pub fn metadata(&self) -> Option<PageMetadata> {
        self.backend.metadata(self.base_url.as_ref())
    }

    /// Links in document order, absolute when a base URL is set (HTML only).
    pub fn links(&self) -> Vec<Link> {
        self.backend.links(self.base_url.as_ref())
    }

    /// Images in document order; sources are absolute when a base URL is set.
    pub fn images(&self) -> Vec<Image> {
        self.backend.images(self.base_url.as_ref())
    }

    /// Tables that have at least one body row.
    pub fn tables(&self) -> Vec<Table> {
        self.backend.tables()
    }

    /// Forms with their fields.
    pub fn forms(&self) -> Vec<Form> {
        self.backend.forms()
    }

    /// Top-level microdata items keyed by item type.
    pub fn microdata(&self) -> IndexMap<String, Value> {
        self.backend.microdata()
    }

    /// Everything readable without rules. Empty for JSON documents.
    pub fn structured_data(&self) -> StructuredData {
        StructuredData {
            metadata: self.metadata(),
            links: self.links(),
            images: self.images(),
            tables: self.tables(),
            forms: self.forms(),
            microdata: self.microdata(),
        }
    }
}
