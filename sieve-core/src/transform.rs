//! Named value transforms.
//!
//! Transforms are pure functions applied to extracted values after
//! multiplicity has been resolved. The registry ships with builtins and
//! accepts custom closures; registering under an existing name replaces it.
//!
//! ## Builtins
//!
//! | Name (aliases) | Effect |
//! |----------------|--------|
//! | `strip` (`trim`) | Trim surrounding whitespace |
//! | `strip-whitespace` (`clean`) | Collapse internal whitespace and trim |
//! | `lower`, `upper`, `title` | Change case |
//! | `int` (`to-int`) | Parse an integer, `0` when unparsable |
//! | `float` (`to-float`) | Parse a float, `0.0` when unparsable |
//! | `bool` | Keyword truthiness, see below |
//! | `json` | Parse a string as JSON, unchanged when unparsable |
//! | `to-absolute-url` (`absolute_url`) | Resolve against the document base URL |
//!
//! `bool` reads strings as keywords rather than by emptiness: only `true`,
//! `yes`, `on` and `1` (any case, surrounding whitespace ignored) are true,
//! so scraped text such as `"false"`, `"0"` or `"In stock"` is false.
//! Numbers are true when non-zero; arrays and objects when non-empty.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::CoreError;

/// Context available to transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformContext<'a> {
    /// Base URL of the document being resolved.
    pub base_url: Option<&'a Url>,
}

/// A registered transform function.
pub type TransformFn = Arc<dyn Fn(Value, &TransformContext<'_>) -> Value + Send + Sync>;

// ============================================================================
// Registry
// ============================================================================

/// Name to transform mapping.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformRegistry {
    /// Creates a registry holding the builtin transforms.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Creates a registry with no transforms at all.
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    fn register_builtins(&mut self) {
        self.register_aliases(&["strip", "trim"], |v, _| map_str(v, |s| s.trim().to_string()));
        self.register_aliases(&["strip-whitespace", "clean"], |v, _| {
            map_str(v, |s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        });
        self.register("lower", |v, _| map_str(v, str::to_lowercase));
        self.register("upper", |v, _| map_str(v, str::to_uppercase));
        self.register("title", |v, _| map_str(v, title_case));
        self.register_aliases(&["int", "to-int"], |v, _| to_int(&v));
        self.register_aliases(&["float", "to-float"], |v, _| to_float(&v));
        self.register("bool", |v, _| Value::Bool(truthy(&v)));
        self.register("json", |v, _| match v {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        });
        self.register_aliases(&["to-absolute-url", "absolute_url"], |v, ctx| match ctx.base_url {
            Some(base) => map_str(v, |s| {
                base.join(s.trim())
                    .map_or_else(|_| s.to_string(), |u| u.to_string())
            }),
            None => v,
        });
    }

    /// Registers a transform, replacing any existing one with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, transform: F) -> &mut Self
    where
        F: Fn(Value, &TransformContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    fn register_aliases<F>(&mut self, names: &[&str], transform: F)
    where
        F: Fn(Value, &TransformContext<'_>) -> Value + Send + Sync + 'static,
    {
        let transform: TransformFn = Arc::new(transform);
        for name in names {
            self.transforms
                .insert((*name).to_string(), Arc::clone(&transform));
        }
    }

    /// Returns true if a transform is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Looks up a transform.
    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    /// Applies a named transform.
    pub fn apply(
        &self,
        name: &str,
        value: Value,
        ctx: &TransformContext<'_>,
    ) -> Result<Value, CoreError> {
        let transform = self
            .get(name)
            .ok_or_else(|| CoreError::config(format!("Unknown transform '{name}'")))?;
        Ok(transform(value, ctx))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// Builtin Helpers
// ============================================================================

fn map_str(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps digits, sign, and decimal point, then parses.
fn numeric_part(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

#[allow(clippy::cast_possible_truncation)]
fn to_int(value: &Value) -> Value {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => numeric_part(s).map(|f| f.trunc() as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    Value::from(n.unwrap_or(0))
}

fn to_float(value: &Value) -> Value {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => numeric_part(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    Value::from(n.unwrap_or(0.0))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "on" | "1"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, value: Value) -> Value {
        TransformRegistry::new()
            .apply(name, value, &TransformContext::default())
            .unwrap()
    }

    #[test]
    fn test_string_transforms() {
        assert_eq!(apply("strip", json!("  hi  ")), json!("hi"));
        assert_eq!(apply("trim", json!("  hi  ")), json!("hi"));
        assert_eq!(apply("clean", json!(" a \n  b\tc ")), json!("a b c"));
        assert_eq!(apply("lower", json!("MiXeD")), json!("mixed"));
        assert_eq!(apply("upper", json!("MiXeD")), json!("MIXED"));
        assert_eq!(apply("title", json!("hello  wORLD")), json!("Hello World"));
        assert_eq!(apply("upper", json!(5)), json!(5));
    }

    #[test]
    fn test_numeric_transforms() {
        assert_eq!(apply("int", json!("1,234 items")), json!(1234));
        assert_eq!(apply("to-int", json!("12.7")), json!(12));
        assert_eq!(apply("int", json!("n/a")), json!(0));
        assert_eq!(apply("float", json!("$1,299.50")), json!(1299.5));
        assert_eq!(apply("to-float", json!("1.2.3")), json!(0.0));
        assert_eq!(apply("float", json!(3)), json!(3.0));
    }

    #[test]
    fn test_bool_and_json() {
        assert_eq!(apply("bool", json!("Yes")), json!(true));
        assert_eq!(apply("bool", json!("no")), json!(false));
        assert_eq!(apply("bool", json!(0)), json!(false));
        assert_eq!(apply("bool", json!(2.5)), json!(true));
        assert_eq!(apply("bool", json!(" ON ")), json!(true));
        assert_eq!(apply("bool", json!([])), json!(false));
        assert_eq!(apply("json", json!(r#"{"a": 1}"#)), json!({"a": 1}));
        assert_eq!(apply("json", json!("not json")), json!("not json"));
    }

    #[test]
    fn test_bool_reads_strings_as_keywords() {
        assert_eq!(apply("bool", json!("false")), json!(false));
        assert_eq!(apply("bool", json!("0")), json!(false));
        assert_eq!(apply("bool", json!("In stock")), json!(false));
        assert_eq!(apply("bool", json!("")), json!(false));
        assert_eq!(apply("bool", json!("TRUE")), json!(true));
        assert_eq!(apply("bool", json!(["false"])), json!(true));
    }

    #[test]
    fn test_absolute_url_uses_base() {
        let registry = TransformRegistry::new();
        let base = Url::parse("https://example.com/catalog/page").unwrap();
        let ctx = TransformContext { base_url: Some(&base) };

        let out = registry.apply("to-absolute-url", json!("../item/1"), &ctx).unwrap();
        assert_eq!(out, json!("https://example.com/item/1"));

        let unchanged = registry
            .apply("absolute_url", json!("/x"), &TransformContext::default())
            .unwrap();
        assert_eq!(unchanged, json!("/x"));
    }

    #[test]
    fn test_custom_and_unknown_transforms() {
        let mut registry = TransformRegistry::new();
        registry.register("strip", |_, _| json!("replaced"));
        registry.register("shout", |v, _| map_str(v, |s| format!("{s}!")));

        let ctx = TransformContext::default();
        assert_eq!(registry.apply("strip", json!(" x "), &ctx).unwrap(), json!("replaced"));
        assert_eq!(registry.apply("shout", json!("hey"), &ctx).unwrap(), json!("hey!"));
        assert!(registry.apply("nope", json!(1), &ctx).unwrap_err().is_configuration());
        assert!(TransformRegistry::empty().names().is_empty());
    }
}
