//! Domain models for sieve.
//!
//! ## Submodules
//!
//! - `content` - Payload content kinds (`ContentKind`)
//! - `rule` - Extraction rules and locators
//! - `result` - Per-document extraction results
//! - `metadata` - Page metadata and links
//! - `structure` - Images, tables, forms, and microdata

mod content;
mod metadata;
mod result;
mod rule;
mod structure;

pub use content::ContentKind;
pub use metadata::{Link, PageMetadata};
pub use result::ExtractionResult;
pub use rule::{
    AttributeSelector, ExtractionRule, Locator, LocatorKind, LocatorSpec, RuleBuilder, RuleSpec,
};
pub use structure::{Form, FormField, Image, SelectOption, StructuredData, Table, TableRow};
