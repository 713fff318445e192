//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use serde_json::{Value, json};
use sieve_core::sitemap::SitemapEntry;
use sieve_core::{
    ExtractionResult, Form, FormField, Link, PageMetadata, ScrapeConfig, StructuredData, Table,
    TableRow,
};
use sieve_fetch::{
    ErrorKind, Failure, PageResult, PaginatedRun, SitemapCollection, StatsSnapshot,
    TerminationReason,
};

use super::json::JsonFormatter;
use super::text::TextFormatter;

fn page(url: &str, names: Value) -> PageResult {
    let mut result = ExtractionResult::new();
    result.insert("names", names);
    result.insert("heading", json!("Lamps"));
    PageResult {
        target: url.to_string(),
        url: url.to_string(),
        status: 200,
        attempts: 1,
        result,
    }
}

fn failure(target: &str) -> Failure {
    Failure {
        target: target.to_string(),
        error_kind: ErrorKind::Timeout,
        message: "no response within 30s".to_string(),
        attempts_made: 3,
    }
}

mod text_formatter_tests {
    use super::*;

    #[test]
    fn test_outcome_success_lists_values() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_outcome(0, &Ok(page("https://a.test/", json!(["Desk", "Floor"]))));

        assert!(output.starts_with("✓ [0] https://a.test/ (200, 1 attempt)"));
        assert!(output.contains("    names: [\"Desk\",\"Floor\"]"));
        assert!(output.contains("    heading: \"Lamps\""));
    }

    #[test]
    fn test_outcome_failure_shows_kind_and_attempts() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_outcome(4, &Err(failure("https://b.test/")));

        assert_eq!(
            output,
            "✗ [4] https://b.test/ timeout after 3 attempts\n    no response within 30s"
        );
    }

    #[test]
    fn test_colors_only_when_enabled() {
        let outcome = Ok(page("https://a.test/", json!([])));

        assert!(TextFormatter::new(true).format_outcome(0, &outcome).contains("\x1b["));
        assert!(!TextFormatter::new(false).format_outcome(0, &outcome).contains("\x1b["));
    }

    #[test]
    fn test_long_values_are_cut() {
        let formatter = TextFormatter::new(false);
        let long = Value::String("x".repeat(500));

        let rendered = formatter.format_value(&long);
        assert!(rendered.ends_with('…'));
        assert_eq!(rendered.chars().count(), 121);
    }

    #[test]
    fn test_run_summary() {
        let formatter = TextFormatter::new(false);
        let run = PaginatedRun {
            start: "https://a.test/list".to_string(),
            pages: vec![
                page("https://a.test/list", json!(["a", "b"])),
                page("https://a.test/list?page=2", json!(["c"])),
            ],
            termination: TerminationReason::PageFailed,
            failure: Some(failure("https://a.test/list?page=3")),
        };

        let output = formatter.format_run(&run);
        let first_line = output.lines().next().unwrap();
        assert!(first_line.starts_with("https://a.test/list - 2 pages, 5 items, "));
        assert!(output.contains("✗ [2] https://a.test/list?page=3"));
    }

    #[test]
    fn test_extraction_lists_missing_and_links() {
        let formatter = TextFormatter::new(false);
        let mut result = ExtractionResult::new();
        result.insert("title", json!("Hello"));
        result.mark_missing("price");
        let structure = StructuredData {
            metadata: Some(PageMetadata {
                title: Some("Hello".into()),
                ..PageMetadata::default()
            }),
            links: vec![Link {
                url: "https://a.test/next".into(),
                text: "Next".into(),
            }],
            ..StructuredData::default()
        };

        let output = formatter.format_extraction("page.html", &result, Some(&structure));
        assert!(output.contains("  price: missing (required)"));
        assert!(output.contains("  Title:       Hello"));
        assert!(output.contains("Links (1)"));
        assert!(output.contains("  https://a.test/next Next"));
        assert!(!output.contains("Images"));

        let bare = formatter.format_extraction("page.html", &result, None);
        assert!(!bare.contains("Links"));
    }

    #[test]
    fn test_extraction_shows_tables_and_forms() {
        let formatter = TextFormatter::new(false);
        let structure = StructuredData {
            tables: vec![Table {
                headers: vec!["sku".into(), "price".into()],
                rows: vec![
                    TableRow::Keyed(
                        [("sku", "L-1"), ("price", "19.90")]
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    ),
                    TableRow::Cells(vec!["sold out".into()]),
                ],
            }],
            forms: vec![Form {
                action: "/search".into(),
                method: "get".into(),
                id: None,
                fields: vec![FormField {
                    kind: "text".into(),
                    name: Some("q".into()),
                    required: true,
                    ..FormField::default()
                }],
            }],
            ..StructuredData::default()
        };

        let output =
            formatter.format_extraction("page.html", &ExtractionResult::new(), Some(&structure));
        assert!(output.contains("Table 1 (2 rows)"));
        assert!(output.contains("  sku | price"));
        assert!(output.contains("  L-1 | 19.90"));
        assert!(output.contains("  sold out"));
        assert!(output.contains("Form GET /search"));
        assert!(output.contains("  q text required"));
    }

    #[test]
    fn test_sitemap_summary_and_listing() {
        let formatter = TextFormatter::new(false);
        let collection = SitemapCollection {
            root: "https://a.test/sitemap.xml".into(),
            urls: vec![
                SitemapEntry {
                    loc: "https://a.test/1".into(),
                    lastmod: Some("2026-10-01".into()),
                    ..SitemapEntry::default()
                },
                SitemapEntry {
                    loc: "https://a.test/2".into(),
                    ..SitemapEntry::default()
                },
            ],
            sitemaps: vec!["https://a.test/sitemap.xml".into()],
            failures: vec![failure("https://a.test/broken.xml")],
            skipped: 0,
        };

        let listed = formatter.format_sitemap(&collection, true);
        assert!(listed.starts_with("https://a.test/sitemap.xml 2 URLs from 1 sitemap"));
        assert!(listed.contains("  https://a.test/1 2026-10-01"));
        assert!(listed.contains("✗ https://a.test/broken.xml"));

        let summary = formatter.format_sitemap(&collection, false);
        assert!(!summary.contains("https://a.test/1"));
    }

    #[test]
    fn test_check_summary_for_default_job() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_check(&ScrapeConfig::default());

        assert!(output.contains("0 rules, 0 targets"));
        assert!(output.contains("Pagination: off"));
    }

    #[test]
    fn test_stats_line() {
        let formatter = TextFormatter::new(false);
        let stats = StatsSnapshot {
            requests: 5,
            successes: 3,
            failures: 1,
            retries: 1,
            rate_limited: 0,
            bytes_received: 2048,
        };

        assert_eq!(
            formatter.format_stats(&stats),
            "3 succeeded, 1 failed | 5 requests, 1 retry, 0 rate limited, 2.0 KB"
        );
    }
}

mod json_formatter_tests {
    use super::*;

    #[test]
    fn test_format_compact_json() {
        let formatter = JsonFormatter::new(false);

        let data = json!({"key": "value"});
        let output = formatter.format(&data).unwrap();

        assert_eq!(output, r#"{"key":"value"}"#);
    }

    #[test]
    fn test_format_pretty_json() {
        let formatter = JsonFormatter::new(true);

        let output = formatter.format(&json!({"key": "value"})).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_outcome_success() {
        let formatter = JsonFormatter::new(false);
        let output = formatter
            .format_outcome(2, &Ok(page("https://a.test/", json!(["Desk"]))))
            .unwrap();

        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["index"], 2);
        assert_eq!(parsed["ok"], true);
        assert_eq!(parsed["status"], 200);
        assert_eq!(parsed["data"]["names"], json!(["Desk"]));
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_outcome_failure() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.format_outcome(1, &Err(failure("https://b.test/"))).unwrap();

        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["ok"], false);
        assert_eq!(parsed["attempts"], 3);
        assert_eq!(parsed["error"]["kind"], "timeout");
        assert!(parsed.get("data").is_none());
    }

    #[test]
    fn test_run_output() {
        let formatter = JsonFormatter::new(false);
        let run = PaginatedRun {
            start: "https://a.test/list".to_string(),
            pages: vec![page("https://a.test/list", json!(["a", "b"]))],
            termination: TerminationReason::NoNextPage,
            failure: None,
        };

        let parsed: Value = serde_json::from_str(&formatter.format_run(&run).unwrap()).unwrap();
        assert_eq!(parsed["clean"], true);
        assert_eq!(parsed["totalItems"], 3);
        assert_eq!(parsed["pages"].as_array().unwrap().len(), 1);
        assert!(parsed.get("failure").is_none());
    }

    #[test]
    fn test_extraction_output_uses_camel_case() {
        let formatter = JsonFormatter::new(false);
        let mut result = ExtractionResult::new();
        result.mark_missing("price");

        let output = formatter.format_extraction("page.json", &result, None).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["missingRequired"], json!(["price"]));
        assert!(parsed.get("links").is_none());
        assert!(parsed.get("metadata").is_none());

        let structure = StructuredData {
            links: vec![Link {
                url: "https://a.test/".into(),
                text: String::new(),
            }],
            ..StructuredData::default()
        };
        let output = formatter
            .format_extraction("page.html", &result, Some(&structure))
            .unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["links"][0]["url"], "https://a.test/");
        assert_eq!(parsed["tables"], json!([]));
    }

    #[test]
    fn test_sitemap_output() {
        let formatter = JsonFormatter::new(false);
        let collection = SitemapCollection {
            root: "https://a.test/sitemap.xml".into(),
            urls: vec![SitemapEntry {
                loc: "https://a.test/1".into(),
                ..SitemapEntry::default()
            }],
            sitemaps: vec!["https://a.test/sitemap.xml".into()],
            failures: Vec::new(),
            skipped: 2,
        };

        let output = formatter.format_sitemap(&collection).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["count"], 1);
        assert_eq!(parsed["urls"], json!(["https://a.test/1"]));
        assert_eq!(parsed["skipped"], 2);
        assert!(parsed.get("failures").is_none());
    }
}
