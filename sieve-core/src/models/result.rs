//! Extraction results.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Values extracted from one document, keyed by rule name in rule order.
///
/// Rules that were required but matched nothing are listed in
/// `missing_required` rather than silently omitted from `values`. Rules whose
/// value is their configured default are listed in `defaulted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted values in rule registration order.
    pub values: IndexMap<String, Value>,
    /// Names of required rules that matched nothing.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub missing_required: IndexSet<String>,
    /// Names of rules that matched nothing and took their default.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub defaulted: IndexSet<String>,
}

impl ExtractionResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value for a rule.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Records a required rule that matched nothing.
    pub fn mark_missing(&mut self, name: impl Into<String>) {
        self.missing_required.insert(name.into());
    }

    /// Records a rule whose value is its default, not a match.
    pub fn mark_defaulted(&mut self, name: impl Into<String>) {
        self.defaulted.insert(name.into());
    }

    /// Looks up a value by rule name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true when every required rule matched.
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Number of extracted values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Counts the items carried by a rule's value.
    ///
    /// Arrays count their elements, null and empty strings count as zero,
    /// anything else counts as one. Unknown and defaulted rules count as
    /// zero.
    pub fn item_count(&self, name: &str) -> usize {
        if self.defaulted.contains(name) {
            return 0;
        }
        match self.values.get(name) {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len(),
            Some(Value::String(s)) if s.is_empty() => 0,
            Some(_) => 1,
        }
    }

    /// Total item count over all values.
    pub fn total_items(&self) -> usize {
        self.values.keys().map(|k| self.item_count(k)).sum()
    }

    /// Converts the values into a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preserves_insertion_order() {
        let mut result = ExtractionResult::new();
        result.insert("zeta", json!(1));
        result.insert("alpha", json!(2));

        let keys: Vec<_> = result.values.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(
            serde_json::to_string(&result.to_json()).unwrap(),
            r#"{"zeta":1,"alpha":2}"#
        );
    }

    #[test]
    fn test_item_count() {
        let mut result = ExtractionResult::new();
        result.insert("items", json!(["a", "b", "c"]));
        result.insert("title", json!("Hello"));
        result.insert("blank", json!(""));
        result.insert("none", Value::Null);

        assert_eq!(result.item_count("items"), 3);
        assert_eq!(result.item_count("title"), 1);
        assert_eq!(result.item_count("blank"), 0);
        assert_eq!(result.item_count("none"), 0);
        assert_eq!(result.item_count("unknown"), 0);
        assert_eq!(result.total_items(), 4);
    }

    #[test]
    fn test_defaulted_values_are_not_items() {
        let mut result = ExtractionResult::new();
        result.insert("items", json!(["placeholder"]));
        result.insert("title", json!("Hello"));
        result.mark_defaulted("items");

        assert_eq!(result.get("items"), Some(&json!(["placeholder"])));
        assert_eq!(result.item_count("items"), 0);
        assert_eq!(result.total_items(), 1);
        assert!(result.is_complete());
    }

    #[test]
    fn test_missing_required_is_tracked() {
        let mut result = ExtractionResult::new();
        assert!(result.is_complete());
        result.mark_missing("price");
        assert!(!result.is_complete());
        assert!(result.missing_required.contains("price"));
    }
}
