//! Rule resolution.
//!
//! The [`RuleResolver`] turns a [`Document`] plus registered
//! [`ExtractionRule`]s into an [`ExtractionResult`]. It depends only on the
//! [`Backend`](crate::backend::Backend) query contract, never on a concrete
//! parsing library.
//!
//! Resolution of one rule:
//!
//! 1. Locators run left to right; the first one producing a non-empty
//!    sequence wins. A standalone regex runs over the raw payload.
//! 2. Each match is converted through the attribute selector (`text`,
//!    `html`, or a named attribute, missing attributes giving `""`).
//! 3. A chained regex, if any, runs over each converted value; values it
//!    does not match are dropped.
//! 4. Multiplicity: the first value, or every value for `multiple` rules.
//!    Empty results fall back to the default, then to required-missing.
//! 5. The transform runs element-wise on extracted values. Defaults are
//!    returned as configured, without transformation.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{Node, regex_first};
use crate::document::Document;
use crate::error::CoreError;
use crate::models::{AttributeSelector, ExtractionResult, ExtractionRule, Locator};
use crate::transform::{TransformContext, TransformRegistry};

/// Resolves extraction rules against documents.
///
/// Registration validates transform names, so resolution never fails on an
/// unknown transform. A resolver holds no per-document state and can be
/// shared across tasks.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    transforms: Arc<TransformRegistry>,
    rules: Vec<ExtractionRule>,
}

impl Default for RuleResolver {
    fn default() -> Self {
        Self::new(Arc::new(TransformRegistry::new()))
    }
}

impl RuleResolver {
    /// Creates a resolver with no rules.
    pub fn new(transforms: Arc<TransformRegistry>) -> Self {
        Self {
            transforms,
            rules: Vec::new(),
        }
    }

    /// Creates a resolver and registers every rule, failing on the first invalid one.
    pub fn with_rules(
        transforms: Arc<TransformRegistry>,
        rules: impl IntoIterator<Item = ExtractionRule>,
    ) -> Result<Self, CoreError> {
        let mut resolver = Self::new(transforms);
        for rule in rules {
            resolver.register(rule)?;
        }
        Ok(resolver)
    }

    /// Registers a rule.
    ///
    /// Fails with a configuration error when the transform is unknown or the
    /// name is already taken.
    pub fn register(&mut self, rule: ExtractionRule) -> Result<(), CoreError> {
        self.check(&rule)?;
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return Err(CoreError::config(format!(
                "Duplicate rule name '{}'",
                rule.name()
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Validates a rule against this resolver's transform registry without registering it.
    pub fn check(&self, rule: &ExtractionRule) -> Result<(), CoreError> {
        match rule.transform() {
            Some(name) if !self.transforms.contains(name) => Err(CoreError::config(format!(
                "Rule '{}' uses unknown transform '{name}'",
                rule.name()
            ))),
            _ => Ok(()),
        }
    }

    /// Registered rules in registration order.
    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Looks up a registered rule.
    pub fn rule(&self, name: &str) -> Option<&ExtractionRule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// The transform registry.
    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves one rule against a document.
    ///
    /// Returns [`CoreError::MissingRequired`] when a required rule without a
    /// default matches nothing.
    pub fn resolve(&self, document: &Document, rule: &ExtractionRule) -> Result<Value, CoreError> {
        self.resolve_matched(document, rule).map(|(value, _)| value)
    }

    /// Resolves every registered rule.
    ///
    /// Required-missing rules are recorded in
    /// [`ExtractionResult::missing_required`] and resolution continues with
    /// the remaining rules. Rules that fell back to their default are
    /// recorded in [`ExtractionResult::defaulted`]. Any other error aborts
    /// extraction.
    pub fn extract(&self, document: &Document) -> Result<ExtractionResult, CoreError> {
        let mut result = ExtractionResult::new();
        for rule in &self.rules {
            match self.resolve_matched(document, rule) {
                Ok((value, matched)) => {
                    if !matched && rule.default_value().is_some() {
                        result.mark_defaulted(rule.name());
                    }
                    result.insert(rule.name(), value);
                }
                Err(CoreError::MissingRequired { rule: name, locator }) => {
                    warn!(rule = %name, locator = %locator, "Required field not found");
                    result.mark_missing(name);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            rules = self.rules.len(),
            missing = result.missing_required.len(),
            defaulted = result.defaulted.len(),
            backend = document.backend_name(),
            "Extraction complete"
        );
        Ok(result)
    }

    /// Resolves a rule and reports whether any locator matched.
    fn resolve_matched(
        &self,
        document: &Document,
        rule: &ExtractionRule,
    ) -> Result<(Value, bool), CoreError> {
        let values = self.locate(document, rule)?;
        let ctx = TransformContext {
            base_url: document.base_url(),
        };

        if rule.is_multiple() {
            if values.is_empty() {
                if let Some(default) = rule.default_value() {
                    return Ok((default.clone(), false));
                }
            }
            let matched = !values.is_empty();
            let values = values
                .into_iter()
                .map(|v| self.transform(rule, v, &ctx))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok((Value::Array(values), matched));
        }

        match values.into_iter().next() {
            Some(value) => Ok((self.transform(rule, value, &ctx)?, true)),
            None => match rule.default_value() {
                Some(default) => Ok((default.clone(), false)),
                None if rule.is_required() => Err(CoreError::MissingRequired {
                    rule: rule.name().to_string(),
                    locator: rule.describe_locators(),
                }),
                None => Ok((Value::Null, false)),
            },
        }
    }

    fn locate(&self, document: &Document, rule: &ExtractionRule) -> Result<Vec<Value>, CoreError> {
        for locator in rule.locators() {
            let nodes = document.query(locator)?;
            if nodes.is_empty() {
                continue;
            }

            let standalone_regex = matches!(locator, Locator::Regex(_));
            let mut values = Vec::with_capacity(nodes.len());
            for node in &nodes {
                // A JSON null is absent data, not a match.
                if node.is_null() {
                    continue;
                }
                if standalone_regex {
                    values.push(Value::String(node.text()));
                    continue;
                }
                let value = select_attribute(node.as_ref(), rule.attribute());
                match rule.chain() {
                    Some(regex) => {
                        if let Some(found) = regex_first(&value_text(&value), regex) {
                            values.push(Value::String(found));
                        }
                    }
                    _ => values.push(value),
                }
            }

            if !values.is_empty() {
                debug!(rule = rule.name(), locator = %locator, matches = values.len(), "Locator matched");
                return Ok(values);
            }
        }
        Ok(Vec::new())
    }

    fn transform(
        &self,
        rule: &ExtractionRule,
        value: Value,
        ctx: &TransformContext<'_>,
    ) -> Result<Value, CoreError> {
        match rule.transform() {
            Some(name) => self.transforms.apply(name, value, ctx),
            None => Ok(value),
        }
    }
}

fn select_attribute(node: &dyn Node, attribute: &AttributeSelector) -> Value {
    match attribute {
        AttributeSelector::Text => node
            .structured()
            .unwrap_or_else(|| Value::String(node.text())),
        AttributeSelector::Html => Value::String(node.html()),
        AttributeSelector::Named(name) => Value::String(node.attribute(name).unwrap_or_default()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
