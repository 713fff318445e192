//! Structured page content: images, tables, forms, and the combined view.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metadata::{Link, PageMetadata};

/// An `<img>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Image source, absolute when the document has a base URL.
    pub src: String,
    /// Alternative text.
    #[serde(default)]
    pub alt: String,
    /// `title` attribute.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// `width` attribute as written.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub width: String,
    /// `height` attribute as written.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub height: String,
}

/// One body row of a table.
///
/// Rows with exactly one cell per header are keyed by header text; any other
/// row keeps its cells positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRow {
    /// Cells keyed by header, in header order.
    Keyed(IndexMap<String, String>),
    /// Cells in column order.
    Cells(Vec<String>),
}

impl TableRow {
    /// Number of cells in the row.
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(cells) => cells.len(),
            Self::Cells(cells) => cells.len(),
        }
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell text by header, for keyed rows.
    pub fn get(&self, header: &str) -> Option<&str> {
        match self {
            Self::Keyed(cells) => cells.get(header).map(String::as_str),
            Self::Cells(_) => None,
        }
    }
}

/// A `<table>` with its header cells and body rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Header texts from `<thead>`, or from a leading row of `<th>` cells.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    /// Body rows in document order. Empty rows are dropped.
    pub rows: Vec<TableRow>,
}

/// An `<option>` of a `<select>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// `value` attribute, or the option text when absent.
    pub value: String,
    /// Option text.
    pub text: String,
}

/// An `<input>`, `<select>`, or `<textarea>` inside a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Input `type` (default `text`), or `select` / `textarea`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `name` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `id` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `value` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `placeholder` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Whether the `required` attribute is present.
    #[serde(default)]
    pub required: bool,
    /// Options, for `select` fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// A `<form>` and its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// `action` attribute, empty when absent.
    #[serde(default)]
    pub action: String,
    /// Lower-cased `method` attribute, `get` when absent.
    pub method: String,
    /// `id` attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Fields in document order.
    #[serde(default)]
    pub fields: Vec<FormField>,
}

/// Everything sieve can read from a page without rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    /// Head metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    /// Hyperlinks.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Tables that have at least one row.
    #[serde(default)]
    pub tables: Vec<Table>,
    /// Forms.
    #[serde(default)]
    pub forms: Vec<Form>,
    /// Top-level microdata items keyed by item type. Repeated types collect
    /// into an array.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub microdata: IndexMap<String, Value>,
}

impl StructuredData {
    /// Returns true if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.metadata.as_ref().is_none_or(PageMetadata::is_empty)
            && self.links.is_empty()
            && self.images.is_empty()
            && self.tables.is_empty()
            && self.forms.is_empty()
            && self.microdata.is_empty()
    }
}
