//! Resolver behavior tests: multiplicity, defaults, requiredness, fallback
//! chains, chained regexes, and transforms.

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use crate::{
    ContentKind, CoreError, Document, ExtractionRule, LocatorSpec, RuleResolver, TransformRegistry,
};

fn resolver() -> RuleResolver {
    RuleResolver::default()
}

fn rule(value: Value) -> ExtractionRule {
    serde_json::from_value(value).unwrap()
}

// ============================================================================
// Multiplicity
// ============================================================================

#[test]
fn test_single_rule_takes_first_match_in_document_order() {
    let doc = Document::html("<h1>Hello</h1><h1>World</h1>");
    let title = rule(json!({"name": "title", "selector": "h1", "required": true}));

    for _ in 0..3 {
        assert_eq!(resolver().resolve(&doc, &title).unwrap(), json!("Hello"));
    }
}

#[test]
fn test_multiple_rule_collects_attributes() {
    let doc = Document::html(r#"<a href="/x">a</a><a href="/y">b</a>"#);
    let links = rule(json!({"name": "links", "selector": "a", "attribute": "href", "multiple": true}));

    assert_eq!(resolver().resolve(&doc, &links).unwrap(), json!(["/x", "/y"]));
}

#[test]
fn test_multiple_rule_allows_empty_sequence_even_when_required() {
    let doc = Document::html("<p>nothing</p>");
    let items = rule(json!({"name": "items", "selector": "li", "multiple": true, "required": true}));

    assert_eq!(resolver().resolve(&doc, &items).unwrap(), json!([]));
}

#[test]
fn test_missing_attribute_yields_empty_string() {
    let doc = Document::html(r#"<a>no href</a><a href="/y">b</a>"#);
    let links = rule(json!({"name": "links", "selector": "a", "attribute": "href", "multiple": true}));

    assert_eq!(resolver().resolve(&doc, &links).unwrap(), json!(["", "/y"]));
}

#[test]
fn test_html_attribute_returns_outer_markup() {
    let doc = Document::html("<div><b>bold</b></div>");
    let bold = rule(json!({"name": "b", "selector": "b", "attribute": "html"}));

    assert_eq!(resolver().resolve(&doc, &bold).unwrap(), json!("<b>bold</b>"));
}

// ============================================================================
// Required / Default
// ============================================================================

#[test]
fn test_required_without_default_signals_missing() {
    let doc = Document::html("<p>no price here</p>");
    let price = rule(json!({"name": "price", "selector": ".price", "required": true}));

    match resolver().resolve(&doc, &price) {
        Err(CoreError::MissingRequired { rule, locator }) => {
            assert_eq!(rule, "price");
            assert_eq!(locator, "css:.price");
        }
        other => panic!("expected MissingRequired, got {other:?}"),
    }
}

#[test]
fn test_optional_rule_returns_default_exactly() {
    let doc = Document::html("<p>no price here</p>");
    let price = rule(json!({
        "name": "price",
        "selector": ".price",
        "default": "  N/A ",
        "transform": "strip"
    }));

    assert_eq!(resolver().resolve(&doc, &price).unwrap(), json!("  N/A "));
}

#[test]
fn test_optional_rule_without_default_is_null() {
    let doc = Document::html("<p></p>");
    let missing = rule(json!({"name": "x", "selector": "h2"}));

    assert_eq!(resolver().resolve(&doc, &missing).unwrap(), Value::Null);
}

#[test]
fn test_required_rule_with_default_uses_default() {
    let doc = Document::html("<p></p>");
    let r = rule(json!({"name": "x", "selector": "h2", "required": true, "default": 0}));

    assert_eq!(resolver().resolve(&doc, &r).unwrap(), json!(0));
}

#[test]
fn test_extract_collects_missing_required_and_continues() {
    let doc = Document::html("<h1>Title</h1>");
    let resolver = RuleResolver::with_rules(
        Arc::new(TransformRegistry::new()),
        [
            rule(json!({"name": "title", "selector": "h1"})),
            rule(json!({"name": "price", "selector": ".price", "required": true})),
            rule(json!({"name": "tags", "selector": ".tag", "multiple": true})),
        ],
    )
    .unwrap();

    let result = resolver.extract(&doc).unwrap();
    assert_eq!(result.get("title"), Some(&json!("Title")));
    assert_eq!(result.get("tags"), Some(&json!([])));
    assert!(result.get("price").is_none());
    assert!(result.missing_required.contains("price"));
    assert!(!result.is_complete());
}

#[test]
fn test_extract_records_defaulted_rules() {
    let doc = Document::html("<h1>Title</h1>");
    let resolver = RuleResolver::with_rules(
        Arc::new(TransformRegistry::new()),
        [
            rule(json!({"name": "title", "selector": "h1", "default": "untitled"})),
            rule(json!({"name": "items", "selector": "li", "multiple": true, "default": ["none"]})),
            rule(json!({"name": "price", "selector": ".price", "default": 0})),
        ],
    )
    .unwrap();

    let result = resolver.extract(&doc).unwrap();
    assert_eq!(result.get("items"), Some(&json!(["none"])));
    assert!(!result.defaulted.contains("title"));
    assert!(result.defaulted.contains("items"));
    assert!(result.defaulted.contains("price"));
    assert_eq!(result.total_items(), 1);
}

// ============================================================================
// Fallbacks and Regex
// ============================================================================

#[test]
fn test_fallback_chain_first_non_empty_wins() {
    let doc = Document::html("<html><head><title>Fallback</title></head><body></body></html>");
    let title = ExtractionRule::builder("title")
        .selector("h1.title")
        .fallback(LocatorSpec::xpath("//title"))
        .fallback(LocatorSpec::css("body"))
        .required(true)
        .build()
        .unwrap();

    assert_eq!(resolver().resolve(&doc, &title).unwrap(), json!("Fallback"));
}

#[test]
fn test_standalone_regex_uses_first_group() {
    let doc = Document::html("<p>Price: $42.50</p><p>Was: $50.00</p>");
    let price = rule(json!({"name": "price", "regex": "\\$([0-9.]+)", "transform": "float"}));
    let all = rule(json!({"name": "all", "regex": "\\$[0-9.]+", "multiple": true}));

    assert_eq!(resolver().resolve(&doc, &price).unwrap(), json!(42.5));
    assert_eq!(resolver().resolve(&doc, &all).unwrap(), json!(["$42.50", "$50.00"]));
}

#[test]
fn test_chained_regex_runs_after_locator() {
    let doc = Document::html(
        r#"<a class="p" href="/p/11">x</a><a class="p" href="/about">y</a><a class="p" href="/p/22">z</a>"#,
    );
    let ids = rule(json!({
        "name": "ids",
        "selector": "a.p",
        "attribute": "href",
        "regex": "/p/(\\d+)",
        "multiple": true,
        "transform": "int"
    }));

    assert_eq!(resolver().resolve(&doc, &ids).unwrap(), json!([11, 22]));
}

// ============================================================================
// JSON Documents
// ============================================================================

#[test]
fn test_json_document_keeps_structured_values() {
    let doc = Document::json(r#"{"product": {"name": "Lamp", "tags": ["home", "light"], "price": 19.5}}"#)
        .unwrap();

    let tags = rule(json!({"name": "tags", "json_path": "$.product.tags"}));
    let each = rule(json!({"name": "each", "json_path": "product.tags[*]", "multiple": true, "transform": "upper"}));
    let price = rule(json!({"name": "price", "json_path": "$.product.price"}));

    assert_eq!(resolver().resolve(&doc, &tags).unwrap(), json!(["home", "light"]));
    assert_eq!(resolver().resolve(&doc, &each).unwrap(), json!(["HOME", "LIGHT"]));
    assert_eq!(resolver().resolve(&doc, &price).unwrap(), json!(19.5));
}

#[test]
fn test_json_null_is_treated_as_no_match() {
    let doc = Document::json(r#"{"a": null, "list": [1, null, 2], "b": {"c": null}}"#).unwrap();

    let required = rule(json!({"name": "a", "json_path": "$.a", "required": true}));
    let err = resolver().resolve(&doc, &required).unwrap_err();
    assert!(matches!(err, CoreError::MissingRequired { ref rule, .. } if rule == "a"));

    let defaulted = rule(json!({"name": "a", "json_path": "$.a", "default": "n/a"}));
    assert_eq!(resolver().resolve(&doc, &defaulted).unwrap(), json!("n/a"));

    let nested = rule(json!({"name": "c", "json_path": "b.c", "default": 0}));
    assert_eq!(resolver().resolve(&doc, &nested).unwrap(), json!(0));

    let many = rule(json!({"name": "list", "json_path": "$.list[*]", "multiple": true}));
    assert_eq!(resolver().resolve(&doc, &many).unwrap(), json!([1, 2]));
}

#[test]
fn test_json_null_falls_through_to_next_locator() {
    let doc = Document::json(r#"{"title": null, "name": "Lamp"}"#).unwrap();
    let title = ExtractionRule::builder("title")
        .json_path("$.title")
        .fallback(LocatorSpec::json_path("$.name"))
        .required(true)
        .build()
        .unwrap();

    assert_eq!(resolver().resolve(&doc, &title).unwrap(), json!("Lamp"));
}

#[test]
fn test_css_rule_against_json_document_is_configuration_error() {
    let doc = Document::parse("{}", ContentKind::Json).unwrap();
    let title = rule(json!({"name": "title", "selector": "h1"}));

    let err = resolver().resolve(&doc, &title).unwrap_err();
    assert!(err.is_configuration());
}

// ============================================================================
// Registration and Transforms
// ============================================================================

#[test]
fn test_unknown_transform_fails_at_registration() {
    let mut resolver = resolver();
    let err = resolver
        .register(rule(json!({"name": "x", "selector": "h1", "transform": "rot13"})))
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(resolver.rules().is_empty());
}

#[test]
fn test_duplicate_rule_names_are_rejected() {
    let mut resolver = resolver();
    resolver.register(rule(json!({"name": "x", "selector": "h1"}))).unwrap();
    assert!(resolver.register(rule(json!({"name": "x", "selector": "h2"}))).is_err());
}

#[test]
fn test_custom_transform_and_absolute_urls() {
    let mut registry = TransformRegistry::new();
    registry.register("slug", |v, _| match v {
        Value::String(s) => Value::String(s.to_lowercase().replace(' ', "-")),
        other => other,
    });
    let mut resolver = RuleResolver::new(Arc::new(registry));
    resolver
        .register(rule(json!({"name": "slug", "selector": "h1", "transform": "slug"})))
        .unwrap();
    resolver
        .register(rule(json!({
            "name": "links",
            "selector": "a",
            "attribute": "href",
            "multiple": true,
            "transform": "to-absolute-url"
        })))
        .unwrap();

    let doc = Document::html(r#"<h1>Big Lamp</h1><a href="/x">x</a><a href="y">y</a>"#)
        .with_base_url(Url::parse("https://shop.example/cat/").unwrap());

    let result = resolver.extract(&doc).unwrap();
    assert_eq!(result.get("slug"), Some(&json!("big-lamp")));
    assert_eq!(
        result.get("links"),
        Some(&json!(["https://shop.example/x", "https://shop.example/cat/y"]))
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let doc = Document::html("<ul><li>1</li><li>2</li></ul><span>x</span>");
    let resolver = RuleResolver::with_rules(
        Arc::new(TransformRegistry::new()),
        [
            rule(json!({"name": "items", "selector": "li", "multiple": true, "transform": "int"})),
            rule(json!({"name": "span", "xpath": "//span/text()"})),
        ],
    )
    .unwrap();

    let first = resolver.extract(&doc).unwrap();
    let second = resolver.extract(&doc).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get("items"), Some(&json!([1, 2])));
    assert_eq!(first.get("span"), Some(&json!("x")));
}
