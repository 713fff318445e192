// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Sieve Core
//!
//! The extraction rule engine behind sieve.
//!
//! This crate turns fetched payloads into structured values using
//! declarative rules:
//!
//! - Parsing backends behind one query contract (`scraper` for HTML,
//!   `serde_json` for JSON) with CSS, XPath, regex, and JSONPath locators
//! - Immutable, validated extraction rules with fallback chains
//! - The rule resolver (multiplicity, defaults, requiredness, transforms)
//! - The transform registry
//! - Job configuration loading
//!
//! ## Key Types
//!
//! ### Rules
//! - [`ExtractionRule`] - A validated rule (build with [`ExtractionRule::builder`])
//! - [`Locator`] - CSS / XPath / regex / JSONPath locator
//! - [`AttributeSelector`] - Text, markup, or a named attribute
//!
//! ### Documents
//! - [`Document`] - One parsed payload
//! - [`Backend`] / [`Node`] - The backend query contract
//! - [`ContentKind`] - HTML or JSON
//!
//! ### Resolution
//! - [`RuleResolver`] - Resolves rules against documents
//! - [`ExtractionResult`] - Ordered name to value mapping
//! - [`TransformRegistry`] - Named value transforms
//!
//! ### Page Structure
//! - [`StructuredData`] - Metadata, links, images, tables, forms, and
//!   microdata read without rules (see [`Document::structured_data`])
//! - [`sitemap::parse_sitemap`] - `<urlset>` / `<sitemapindex>` parsing
//!
//! ## Example
//!
//! ```
//! use sieve_core::{Document, ExtractionRule, RuleResolver};
//!
//! let mut resolver = RuleResolver::default();
//! resolver
//!     .register(ExtractionRule::builder("title").selector("h1").build()?)?;
//!
//! let doc = Document::html("<h1>Hello</h1><h1>World</h1>");
//! let result = resolver.extract(&doc)?;
//! assert_eq!(result.get("title"), Some(&serde_json::json!("Hello")));
//! # Ok::<(), sieve_core::CoreError>(())
//! ```

pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod resolver;
pub mod sitemap;
pub mod transform;

// Re-export error types
pub use error::CoreError;

// Re-export model types
pub use models::{
    AttributeSelector, ContentKind, ExtractionResult, ExtractionRule, Form, FormField, Image, Link,
    Locator, LocatorKind, LocatorSpec, PageMetadata, RuleBuilder, RuleSpec, SelectOption,
    StructuredData, Table, TableRow,
};

// Re-export engine types
pub use backend::{Backend, JsonBackend, Node, ScraperBackend};
pub use config::{PaginationConfig, PaginationMode, RateLimitConfig, RetryConfig, ScrapeConfig};
pub use document::Document;
pub use resolver::RuleResolver;
pub use transform::{TransformContext, TransformFn, TransformRegistry};

#[cfg(test)]
mod resolver_tests;
