//! Sitemap parsing.
//!
//! Reads the two sitemap protocol documents: a `<urlset>` listing pages and
//! a `<sitemapindex>` listing further sitemaps. Element names are matched by
//! local name, so namespace prefixes do not matter. Only direct children of
//! an entry are read; extension blocks such as `<image:image><image:loc>`
//! never overwrite the entry's own `<loc>`.
//!
//! Fetching, recursion into index entries, and de-duplication live with the
//! fetch layer; this module only turns one XML payload into entries.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Backend name reported in parse errors.
const BACKEND: &str = "quick-xml";

/// One `<url>` or `<sitemap>` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    /// Location, trimmed.
    pub loc: String,
    /// `<lastmod>` as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    /// `<changefreq>` (url entries only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    /// `<priority>` (url entries only); unparsable values are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "entries", rename_all = "snake_case")]
pub enum Sitemap {
    /// `<urlset>`: page locations.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>`: locations of further sitemaps.
    Index(Vec<SitemapEntry>),
}

impl Sitemap {
    /// Entries in document order.
    pub fn entries(&self) -> &[SitemapEntry] {
        match self {
            Self::UrlSet(entries) | Self::Index(entries) => entries,
        }
    }

    /// Returns true for a sitemap index.
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"loc" => Some(Self::Loc),
            b"lastmod" => Some(Self::LastMod),
            b"changefreq" => Some(Self::ChangeFreq),
            b"priority" => Some(Self::Priority),
            _ => None,
        }
    }

    fn assign(self, entry: &mut SitemapEntry, text: &str) {
        if text.is_empty() {
            return;
        }
        match self {
            Self::Loc => entry.loc = text.to_string(),
            Self::LastMod => entry.lastmod = Some(text.to_string()),
            Self::ChangeFreq => entry.changefreq = Some(text.to_string()),
            Self::Priority => entry.priority = text.parse().ok(),
        }
    }
}

fn parse_error(xml: &str, reason: impl Into<String>) -> CoreError {
    CoreError::Parse {
        backend: BACKEND,
        snippet_len: xml.len(),
        reason: reason.into(),
    }
}

fn root_is_index(xml: &str, name: &[u8]) -> Result<bool, CoreError> {
    match name {
        b"urlset" => Ok(false),
        b"sitemapindex" => Ok(true),
        other => Err(parse_error(
            xml,
            format!(
                "root element <{}> is not a sitemap",
                String::from_utf8_lossy(other)
            ),
        )),
    }
}

/// Parses one sitemap payload.
///
/// Entries without a `<loc>` are skipped. A document whose root is neither
/// `<urlset>` nor `<sitemapindex>`, or malformed XML, is a
/// [`CoreError::Parse`].
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, CoreError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut entries = Vec::new();
    let mut entry: Option<SitemapEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            parse_error(
                xml,
                format!("at byte {}: {e}", reader.buffer_position()),
            )
        })?;
        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match depth {
                    1 => is_index = Some(root_is_index(xml, name.as_ref())?),
                    2 => {
                        let expected: &[u8] = if is_index == Some(true) { b"sitemap" } else { b"url" };
                        if name.as_ref() == expected {
                            entry = Some(SitemapEntry::default());
                        }
                    }
                    3 if entry.is_some() => {
                        field = Field::from_name(name.as_ref());
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) if depth == 0 => {
                is_index = Some(root_is_index(xml, e.local_name().as_ref())?);
            }
            Event::Text(e) if field.is_some() && depth == 3 => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| parse_error(xml, err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) if field.is_some() && depth == 3 => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                match depth {
                    3 => {
                        if let (Some(f), Some(current)) = (field.take(), entry.as_mut()) {
                            f.assign(current, text.trim());
                        }
                    }
                    2 => {
                        if let Some(done) = entry.take().filter(|e| !e.loc.is_empty()) {
                            entries.push(done);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match is_index {
        Some(true) => Ok(Sitemap::Index(entries)),
        Some(false) => Ok(Sitemap::UrlSet(entries)),
        None => Err(parse_error(xml, "no root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://shop.example/</loc>
    <lastmod>2026-09-30</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc> https://shop.example/lamps?a=1&amp;b=2 </loc>
    <image:image><image:loc>https://cdn.example/lamp.png</image:loc></image:image>
    <priority>high</priority>
  </url>
  <url><lastmod>2026-01-01</lastmod></url>
  <url><loc><![CDATA[https://shop.example/cdata]]></loc></url>
</urlset>"#;

    #[test]
    fn test_parse_urlset() {
        let sitemap = parse_sitemap(URLSET).unwrap();
        assert!(!sitemap.is_index());

        let entries = sitemap.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].loc, "https://shop.example/");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2026-09-30"));
        assert_eq!(entries[0].changefreq.as_deref(), Some("daily"));
        assert_eq!(entries[0].priority, Some(1.0));

        assert_eq!(entries[1].loc, "https://shop.example/lamps?a=1&b=2");
        assert_eq!(entries[1].priority, None);
        assert_eq!(entries[2].loc, "https://shop.example/cdata");
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://shop.example/sitemap-1.xml</loc><lastmod>2026-10-01</lastmod></sitemap>
            <sitemap><loc>https://shop.example/sitemap-2.xml</loc></sitemap>
        </sitemapindex>"#;

        let sitemap = parse_sitemap(xml).unwrap();
        assert!(sitemap.is_index());
        let locs: Vec<_> = sitemap.entries().iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec!["https://shop.example/sitemap-1.xml", "https://shop.example/sitemap-2.xml"]
        );
        assert_eq!(sitemap.entries()[0].lastmod.as_deref(), Some("2026-10-01"));
    }

    #[test]
    fn test_prefixed_elements_match_by_local_name() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sm:url><sm:loc>https://a.example/</sm:loc></sm:url>
        </sm:urlset>"#;

        let sitemap = parse_sitemap(xml).unwrap();
        assert_eq!(sitemap.entries()[0].loc, "https://a.example/");
    }

    #[test]
    fn test_non_sitemap_documents_are_parse_errors() {
        let html = parse_sitemap("<html><body>Not found</body></html>").unwrap_err();
        assert!(matches!(html, CoreError::Parse { backend: "quick-xml", .. }));
        assert!(html.to_string().contains("<html>"));

        assert!(parse_sitemap("").is_err());
        assert!(parse_sitemap("<urlset><url><loc>x</url></urlset>").is_err());
    }

    #[test]
    fn test_empty_urlset() {
        let sitemap = parse_sitemap("<?xml version=\"1.0\"?><sitemapindex/>").unwrap();
        assert!(sitemap.is_index());
        assert!(sitemap.entries().is_empty());

        let sitemap = parse_sitemap("<urlset></urlset>").unwrap();
        assert_eq!(sitemap, Sitemap::UrlSet(Vec::new()));
    }
}
