//! HTML backend built on `scraper`.

use std::cell::OnceCell;

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::jsonpath::JsonPath;
use super::xpath::{XItem, XPath};
use super::{Backend, JsonNode, Node, NodeRef, TextNode, regex_matches, structure};
use crate::error::CoreError;
use crate::models::{ContentKind, Form, Image, Link, Locator, PageMetadata, Table};

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

/// Backend over an HTML tree parsed by `scraper` (html5ever).
///
/// html5ever recovers from any malformed markup, so parsing never fails.
/// `json_path` locators are answered from the document's JSON-LD blocks.
pub struct ScraperBackend {
    source: String,
    html: Html,
    json_ld: OnceCell<Vec<Value>>,
}

impl std::fmt::Debug for ScraperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperBackend")
            .field("source_len", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl ScraperBackend {
    /// Backend name reported in errors.
    pub const NAME: &'static str = "scraper";

    /// Parses an HTML document.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let html = Html::parse_document(&source);
        Self {
            source,
            html,
            json_ld: OnceCell::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Parsed JSON-LD blocks in document order. Malformed blocks are skipped.
    pub fn json_ld(&self) -> &[Value] {
        self.json_ld.get_or_init(|| {
            let Ok(selector) = Selector::parse(JSON_LD_SELECTOR) else {
                return Vec::new();
            };
            self.html
                .select(&selector)
                .filter_map(|script| {
                    let content = script.inner_html();
                    let trimmed = content.trim();
                    if trimmed.is_empty() {
                        return None;
                    }
                    match serde_json::from_str(trimmed) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            debug!(error = %e, "Skipping malformed JSON-LD block");
                            None
                        }
                    }
                })
                .collect()
        })
    }

    fn css<'a>(&'a self, selector: &str) -> Result<Vec<NodeRef<'a>>, CoreError> {
        let selector = Selector::parse(selector).map_err(|e| {
            CoreError::config(format!("Invalid CSS selector '{selector}': {e}"))
        })?;
        Ok(self
            .html
            .select(&selector)
            .map(|el| Box::new(ElementNode(el)) as NodeRef<'a>)
            .collect())
    }

    fn xpath<'a>(&'a self, expression: &str) -> Result<Vec<NodeRef<'a>>, CoreError> {
        let xpath = XPath::parse(expression)?;
        Ok(xpath
            .select(&self.html)
            .into_iter()
            .map(|item| match item {
                XItem::Element(el) => Box::new(ElementNode(el)) as NodeRef<'a>,
                XItem::Value(v) => Box::new(TextNode(v)) as NodeRef<'a>,
            })
            .collect())
    }

    fn json_path<'a>(&'a self, path: &str) -> Result<Vec<NodeRef<'a>>, CoreError> {
        let path = JsonPath::parse(path)?;
        for block in self.json_ld() {
            let found = path.select(block);
            if !found.is_empty() {
                return Ok(found
                    .into_iter()
                    .map(|v| Box::new(JsonNode(v)) as NodeRef<'a>)
                    .collect());
            }
        }
        Ok(Vec::new())
    }

    fn select_first(&self, selector: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(selector).ok()?;
        self.html.select(&selector).next()
    }

    fn meta_content(&self, name: &str) -> Option<String> {
        self.select_first(&format!(r#"meta[name="{name}"]"#))
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn meta_prefixed(&self, prefix: &str) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        let Ok(selector) = Selector::parse("meta") else {
            return out;
        };
        for element in self.html.select(&selector) {
            let key = element
                .value()
                .attr("property")
                .or_else(|| element.value().attr("name"));
            let (Some(key), Some(content)) = (key, element.value().attr("content")) else {
                continue;
            };
            if let Some(stripped) = key.strip_prefix(prefix) {
                out.entry(stripped.to_string())
                    .or_insert_with(|| content.trim().to_string());
            }
        }
        out
    }
}

pub(super) fn absolutize(href: &str, base_url: Option<&Url>) -> String {
    base_url
        .and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), |u| u.to_string())
}

impl Backend for ScraperBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> ContentKind {
        ContentKind::Html
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn query<'a>(&'a self, locator: &Locator) -> Result<Vec<NodeRef<'a>>, CoreError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        match locator {
            Locator::Css(selector) => self.css(selector),
            Locator::XPath(expression) => self.xpath(expression),
            Locator::JsonPath(path) => self.json_path(path),
            Locator::Regex(regex) => Ok(regex_matches(&self.source, regex)
                .into_iter()
                .map(|m| Box::new(TextNode(m)) as NodeRef<'a>)
                .collect()),
        }
    }

    fn metadata(&self, base_url: Option<&Url>) -> Option<PageMetadata> {
        let title = self
            .select_first("title")
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let keywords = self
            .meta_content("keywords")
            .map(|k| {
                k.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let canonical_url = self
            .select_first(r#"link[rel="canonical"]"#)
            .and_then(|el| el.value().attr("href"))
            .map(|href| absolutize(href.trim(), base_url));

        Some(PageMetadata {
            title,
            description: self.meta_content("description"),
            keywords,
            author: self.meta_content("author"),
            language: self.html.root_element().value().attr("lang").map(String::from),
            canonical_url,
            open_graph: self.meta_prefixed("og:"),
            twitter_card: self.meta_prefixed("twitter:"),
            json_ld: self.json_ld().to_vec(),
        })
    }

    fn links(&self, base_url: Option<&Url>) -> Vec<Link> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        self.html
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim();
                if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                    return None;
                }
                Some(Link {
                    url: absolutize(href, base_url),
                    text: el.text().collect::<String>().trim().to_string(),
                })
            })
            .collect()
    }
    fn images(&self, base_url: Option<&Url>) -> Vec<Image> {
        structure::images(&self.html, base_url)
    }

    fn tables(&self) -> Vec<Table> {
        structure::tables(&self.html)
    }

    fn forms(&self) -> Vec<Form> {
        structure::forms(&self.html)
    }

    fn microdata(&self) -> IndexMap<String, Value> {
        structure::microdata(&self.html)
    }
}

// ============================================================================
// Element Node
// ============================================================================

/// An element matched by CSS or XPath.
#[derive(Debug, Clone, Copy)]
struct ElementNode<'a>(ElementRef<'a>);

impl Node for ElementNode<'_> {
    fn text(&self) -> String {
        self.0.text().collect::<String>().trim().to_string()
    }

    fn html(&self) -> String {
        self.0.html()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html lang="en"><head>
        <title> Widget Store </title>
        <meta name="description" content="All the widgets">
        <meta name="keywords" content="widgets, gadgets,">
        <meta property="og:title" content="Widgets">
        <meta name="twitter:card" content="summary">
        <link rel="canonical" href="/store">
        <script type="application/ld+json">{"@type": "Store", "name": "WidgetCo"}</script>
        <script type="application/ld+json">{ not json }</script>
        <script type="application/ld+json">{"@type": "Product", "offers": {"price": "9.99"}}</script>
    </head><body>
        <h1 class="title">Hello <em>there</em></h1>
        <a href="/x">X</a> <a href="https://other.example/y">Y</a> <a href="#top">Top</a>
    </body></html>"##;

    fn texts(nodes: &[NodeRef<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.text()).collect()
    }

    #[test]
    fn test_css_and_xpath_agree() {
        let backend = ScraperBackend::parse(PAGE);
        let css = backend.query(&Locator::css("h1.title").unwrap()).unwrap();
        let xpath = backend.query(&Locator::xpath("//h1[@class='title']").unwrap()).unwrap();
        assert_eq!(texts(&css), vec!["Hello there"]);
        assert_eq!(texts(&xpath), texts(&css));
        assert!(css[0].html().starts_with("<h1 class=\"title\">"));
    }

    #[test]
    fn test_json_path_reads_first_matching_json_ld_block() {
        let backend = ScraperBackend::parse(PAGE);
        assert_eq!(backend.json_ld().len(), 2);

        let nodes = backend
            .query(&Locator::json_path("$.offers.price").unwrap())
            .unwrap();
        assert_eq!(texts(&nodes), vec!["9.99"]);

        let nodes = backend.query(&Locator::json_path("name").unwrap()).unwrap();
        assert_eq!(texts(&nodes), vec!["WidgetCo"]);
    }

    #[test]
    fn test_regex_runs_over_raw_source() {
        let backend = ScraperBackend::parse(PAGE);
        let nodes = backend
            .query(&Locator::regex(r#"href="(/[a-z]+)""#).unwrap())
            .unwrap();
        assert_eq!(texts(&nodes), vec!["/store", "/x"]);
    }

    #[test]
    fn test_empty_document_matches_nothing() {
        let backend = ScraperBackend::parse("   ");
        for locator in [
            Locator::css("html").unwrap(),
            Locator::xpath("//body").unwrap(),
            Locator::json_path("$.a").unwrap(),
        ] {
            assert!(backend.query(&locator).unwrap().is_empty());
        }
    }

    #[test]
    fn test_metadata() {
        let backend = ScraperBackend::parse(PAGE);
        let base = Url::parse("https://shop.example/page").unwrap();
        let meta = backend.metadata(Some(&base)).unwrap();

        assert_eq!(meta.title.as_deref(), Some("Widget Store"));
        assert_eq!(meta.description.as_deref(), Some("All the widgets"));
        assert_eq!(meta.keywords, vec!["widgets", "gadgets"]);
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://shop.example/store"));
        assert_eq!(meta.open_graph.get("title").map(String::as_str), Some("Widgets"));
        assert_eq!(meta.twitter_card.get("card").map(String::as_str), Some("summary"));
        assert_eq!(meta.json_ld.len(), 2);
    }

    #[test]
    fn test_links_are_absolutized() {
        let backend = ScraperBackend::parse(PAGE);
        let base = Url::parse("https://shop.example/page").unwrap();
        let links = backend.links(Some(&base));

        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://shop.example/x", "https://other.example/y"]);
        assert_eq!(links[0].text, "X");
    }
}
