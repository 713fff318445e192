//! JSON backend.

use serde_json::Value;

use super::jsonpath::JsonPath;
use super::{Backend, Node, NodeRef, TextNode, kind_mismatch, regex_matches};
use crate::error::CoreError;
use crate::models::{ContentKind, Locator};

/// Backend over a parsed JSON value.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    source: String,
    value: Option<Value>,
}

impl JsonBackend {
    /// Backend name reported in errors.
    pub const NAME: &'static str = "serde_json";

    /// Parses a JSON payload. Whitespace-only payloads are empty documents.
    pub fn parse(source: impl Into<String>) -> Result<Self, CoreError> {
        let source = source.into();
        let value = if source.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&source).map_err(|e| CoreError::Parse {
                    backend: Self::NAME,
                    snippet_len: source.len(),
                    reason: e.to_string(),
                })?,
            )
        };
        Ok(Self { source, value })
    }

    /// The parsed root value, if the payload was not empty.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Json
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn query<'a>(&'a self, locator: &Locator) -> Result<Vec<NodeRef<'a>>, CoreError> {
        match locator {
            Locator::Css(_) | Locator::XPath(_) => Err(kind_mismatch(locator, self.kind())),
            Locator::JsonPath(path) => {
                let Some(root) = &self.value else {
                    return Ok(Vec::new());
                };
                let path = JsonPath::parse(path)?;
                Ok(path
                    .select(root)
                    .into_iter()
                    .map(|v| Box::new(JsonNode(v)) as NodeRef<'a>)
                    .collect())
            }
            Locator::Regex(regex) => Ok(regex_matches(&self.source, regex)
                .into_iter()
                .map(|m| Box::new(TextNode(m)) as NodeRef<'a>)
                .collect()),
        }
    }
}

// ============================================================================
// JSON Node
// ============================================================================

/// A borrowed JSON value matched by a JSONPath query.
#[derive(Debug, Clone, Copy)]
pub struct JsonNode<'a>(pub &'a Value);

impl Node for JsonNode<'_> {
    fn text(&self) -> String {
        match self.0 {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }

    fn html(&self) -> String {
        self.0.to_string()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|v| JsonNode(v).text())
    }

    fn structured(&self) -> Option<Value> {
        Some(self.0.clone())
    }

    fn is_null(&self) -> bool {
        self.0.is_null()
    }
}
