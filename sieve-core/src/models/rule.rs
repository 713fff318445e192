//! Extraction rules.
//!
//! An [`ExtractionRule`] names a value to pull out of a document and says how
//! to find it. Rules are immutable once built and are validated on
//! construction: an invalid selector, regex, XPath, or JSONPath never makes it
//! into a rule. Transform names are checked later, when the rule is
//! registered with a [`RuleResolver`](crate::RuleResolver), because they
//! depend on the registry in use.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::backend::jsonpath::JsonPath;
use crate::backend::xpath::XPath;
use crate::error::CoreError;

// ============================================================================
// Locator Kind
// ============================================================================

/// The family a locator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// CSS selector.
    Css,
    /// XPath expression.
    XPath,
    /// Regular expression over text.
    Regex,
    /// JSONPath expression.
    JsonPath,
}

impl LocatorKind {
    /// Short name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Regex => "regex",
            Self::JsonPath => "json_path",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Locator
// ============================================================================

/// A validated means of finding nodes or values in a document.
#[derive(Debug, Clone)]
pub enum Locator {
    /// CSS selector, validated with the `scraper` selector parser.
    Css(String),
    /// XPath expression, validated with the built-in XPath parser.
    XPath(String),
    /// JSONPath expression (or dotted path).
    JsonPath(String),
    /// Compiled regular expression.
    Regex(Regex),
}

impl Locator {
    /// Creates a CSS locator, rejecting empty or unparsable selectors.
    pub fn css(selector: impl Into<String>) -> Result<Self, CoreError> {
        let selector = selector.into();
        if selector.trim().is_empty() {
            return Err(CoreError::config("CSS selector cannot be empty"));
        }
        if let Err(e) = Selector::parse(&selector) {
            return Err(CoreError::config(format!(
                "Invalid CSS selector '{selector}': {e}"
            )));
        }
        Ok(Self::Css(selector))
    }

    /// Creates an XPath locator, rejecting expressions outside the supported subset.
    pub fn xpath(expression: impl Into<String>) -> Result<Self, CoreError> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(CoreError::config("XPath expression cannot be empty"));
        }
        XPath::parse(&expression)?;
        Ok(Self::XPath(expression))
    }

    /// Creates a JSONPath locator.
    pub fn json_path(path: impl Into<String>) -> Result<Self, CoreError> {
        let path = path.into();
        JsonPath::parse(&path)?;
        Ok(Self::JsonPath(path))
    }

    /// Creates a regex locator.
    pub fn regex(pattern: &str) -> Result<Self, CoreError> {
        compile_regex(pattern).map(Self::Regex)
    }

    /// Returns the locator family.
    pub fn kind(&self) -> LocatorKind {
        match self {
            Self::Css(_) => LocatorKind::Css,
            Self::XPath(_) => LocatorKind::XPath,
            Self::JsonPath(_) => LocatorKind::JsonPath,
            Self::Regex(_) => LocatorKind::Regex,
        }
    }

    /// Returns the locator source text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) | Self::JsonPath(s) => s,
            Self::Regex(r) => r.as_str(),
        }
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.as_str() == other.as_str()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, CoreError> {
    if pattern.is_empty() {
        return Err(CoreError::config("Regex pattern cannot be empty"));
    }
    Regex::new(pattern)
        .map_err(|e| CoreError::config(format!("Invalid regex '{pattern}': {e}")))
}

// ============================================================================
// Attribute Selector
// ============================================================================

/// Which part of a matched node becomes the extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelector {
    /// Trimmed text content (structured value for JSON nodes).
    #[default]
    Text,
    /// Outer markup of the node.
    Html,
    /// A named attribute; missing attributes yield an empty string.
    Named(String),
}

impl AttributeSelector {
    /// Name as written in rule configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Named(name) => name,
        }
    }
}

impl From<&str> for AttributeSelector {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "text" => Self::Text,
            "html" => Self::Html,
            name => Self::Named(name.to_string()),
        }
    }
}

// ============================================================================
// Rule Spec (configuration shape)
// ============================================================================

/// One alternative in a fallback chain. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorSpec {
    /// CSS selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// XPath expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    /// Regular expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// JSONPath expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
}

impl LocatorSpec {
    /// A CSS alternative.
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    /// An XPath alternative.
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self {
            xpath: Some(expression.into()),
            ..Self::default()
        }
    }

    /// A regex alternative.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            regex: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// A JSONPath alternative.
    pub fn json_path(path: impl Into<String>) -> Self {
        Self {
            json_path: Some(path.into()),
            ..Self::default()
        }
    }

    fn into_locator(self, rule: &str) -> Result<Locator, CoreError> {
        let mut found = Vec::with_capacity(1);
        if let Some(s) = self.selector {
            found.push(Locator::css(s)?);
        }
        if let Some(x) = self.xpath {
            found.push(Locator::xpath(x)?);
        }
        if let Some(r) = self.regex {
            found.push(Locator::regex(&r)?);
        }
        if let Some(j) = self.json_path {
            found.push(Locator::json_path(j)?);
        }
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(CoreError::config(format!(
                "Fallback locator in rule '{rule}' sets no locator"
            ))),
            _ => Err(CoreError::config(format!(
                "Fallback locator in rule '{rule}' sets more than one locator"
            ))),
        }
    }
}

impl From<&Locator> for LocatorSpec {
    fn from(locator: &Locator) -> Self {
        let source = locator.as_str().to_string();
        match locator.kind() {
            LocatorKind::Css => Self::css(source),
            LocatorKind::XPath => Self::xpath(source),
            LocatorKind::Regex => Self::regex(source),
            LocatorKind::JsonPath => Self::json_path(source),
        }
    }
}

/// Flat configuration shape of an extraction rule.
///
/// `regex` combined with one of `selector`/`xpath`/`json_path` forms a
/// two-stage pipeline: nodes are located first, then the regex runs over each
/// node's selected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Unique, non-empty rule name.
    pub name: String,
    /// CSS selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// XPath expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    /// Regular expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// JSONPath expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    /// Alternatives tried in order when the primary locator matches nothing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<LocatorSpec>,
    /// `text`, `html`, or an attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Keep every match instead of the first.
    #[serde(default)]
    pub multiple: bool,
    /// Fail extraction when nothing matches and no default is set.
    #[serde(default)]
    pub required: bool,
    /// Value returned when nothing matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Transform name resolved through the transform registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

// ============================================================================
// Extraction Rule
// ============================================================================

/// A validated, immutable extraction rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec", into = "RuleSpec")]
pub struct ExtractionRule {
    name: String,
    locators: Vec<Locator>,
    chain: Option<ChainRegex>,
    attribute: AttributeSelector,
    multiple: bool,
    required: bool,
    default: Option<Value>,
    transform: Option<String>,
}

/// Regex applied to each located node's value.
#[derive(Debug, Clone)]
struct ChainRegex(Regex);

impl PartialEq for ChainRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl ExtractionRule {
    /// Starts building a rule with the given name.
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name)
    }

    /// Rule name, unique within a resolver.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locators in evaluation order (primary first, then fallbacks).
    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    /// Regex chained after node location, if any.
    pub fn chain(&self) -> Option<&Regex> {
        self.chain.as_ref().map(|c| &c.0)
    }

    /// Which part of a node is extracted.
    pub fn attribute(&self) -> &AttributeSelector {
        &self.attribute
    }

    /// Whether all matches are kept.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Whether an empty match is a failure.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Value used when nothing matches.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Transform name, if any.
    pub fn transform(&self) -> Option<&str> {
        self.transform.as_deref()
    }

    /// Human-readable locator chain for diagnostics.
    pub fn describe_locators(&self) -> String {
        let chain = self
            .locators
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        match self.chain() {
            Some(regex) => format!("{chain} ~ regex:{}", regex.as_str()),
            None => chain,
        }
    }
}

impl TryFrom<RuleSpec> for ExtractionRule {
    type Error = CoreError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::config("Rule name cannot be empty"));
        }

        let mut primaries = Vec::with_capacity(1);
        if let Some(s) = spec.selector {
            primaries.push(Locator::css(s)?);
        }
        if let Some(x) = spec.xpath {
            primaries.push(Locator::xpath(x)?);
        }
        if let Some(j) = spec.json_path {
            primaries.push(Locator::json_path(j)?);
        }
        if primaries.len() > 1 {
            return Err(CoreError::config(format!(
                "Rule '{name}' sets more than one of selector, xpath, json_path"
            )));
        }

        let regex = spec.regex.as_deref().map(compile_regex).transpose()?;
        let (mut locators, chain) = match (primaries.pop(), regex) {
            (Some(primary), chain) => (vec![primary], chain.map(ChainRegex)),
            (None, Some(regex)) => (vec![Locator::Regex(regex)], None),
            (None, None) => (Vec::new(), None),
        };

        for alternative in spec.fallback {
            locators.push(alternative.into_locator(&name)?);
        }

        if locators.is_empty() {
            return Err(CoreError::config(format!(
                "Rule '{name}' has no locator: set one of selector, xpath, regex, json_path, or a fallback chain"
            )));
        }

        let transform = spec
            .transform
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            name,
            locators,
            chain,
            attribute: spec
                .attribute
                .as_deref()
                .map(AttributeSelector::from)
                .unwrap_or_default(),
            multiple: spec.multiple,
            required: spec.required,
            default: spec.default.filter(|v| !v.is_null()),
            transform,
        })
    }
}

impl From<ExtractionRule> for RuleSpec {
    fn from(rule: ExtractionRule) -> Self {
        let mut spec = RuleSpec {
            name: rule.name,
            attribute: match rule.attribute {
                AttributeSelector::Text => None,
                other => Some(other.as_str().to_string()),
            },
            multiple: rule.multiple,
            required: rule.required,
            default: rule.default,
            transform: rule.transform,
            ..RuleSpec::default()
        };

        let mut locators = rule.locators.into_iter();
        if let Some(primary) = locators.next() {
            let source = primary.as_str().to_string();
            match primary.kind() {
                LocatorKind::Css => spec.selector = Some(source),
                LocatorKind::XPath => spec.xpath = Some(source),
                LocatorKind::JsonPath => spec.json_path = Some(source),
                LocatorKind::Regex => spec.regex = Some(source),
            }
        }
        if let Some(chain) = rule.chain {
            spec.regex = Some(chain.0.as_str().to_string());
        }
        spec.fallback = locators.map(|l| LocatorSpec::from(&l)).collect();
        spec
    }
}

// ============================================================================
// Rule Builder
// ============================================================================

/// Builder for [`ExtractionRule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    spec: RuleSpec,
}

impl RuleBuilder {
    /// Creates a builder for a rule with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: RuleSpec {
                name: name.into(),
                ..RuleSpec::default()
            },
        }
    }

    /// Sets the CSS selector.
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.spec.selector = Some(selector.into());
        self
    }

    /// Sets the XPath expression.
    pub fn xpath(mut self, expression: impl Into<String>) -> Self {
        self.spec.xpath = Some(expression.into());
        self
    }

    /// Sets the regex (standalone, or chained after another locator).
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.spec.regex = Some(pattern.into());
        self
    }

    /// Sets the JSONPath expression.
    pub fn json_path(mut self, path: impl Into<String>) -> Self {
        self.spec.json_path = Some(path.into());
        self
    }

    /// Appends a fallback alternative.
    pub fn fallback(mut self, alternative: LocatorSpec) -> Self {
        self.spec.fallback.push(alternative);
        self
    }

    /// Sets the attribute selector (`text`, `html`, or an attribute name).
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.spec.attribute = Some(attribute.into());
        self
    }

    /// Keeps all matches.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.spec.multiple = multiple;
        self
    }

    /// Marks the rule as required.
    pub fn required(mut self, required: bool) -> Self {
        self.spec.required = required;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.spec.default = Some(value.into());
        self
    }

    /// Sets the transform name.
    pub fn transform(mut self, name: impl Into<String>) -> Self {
        self.spec.transform = Some(name.into());
        self
    }

    /// Validates and builds the rule.
    pub fn build(self) -> Result<ExtractionRule, CoreError> {
        ExtractionRule::try_from(self.spec)
    }
}

// ============================================================================
// Tests
// ============================================================================
