//! Rule-free readers over a parsed HTML tree: images, tables, forms, and
//! microdata.

use indexmap::{IndexMap, IndexSet};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use super::html::absolutize;
use crate::models::{Form, FormField, Image, SelectOption, Table, TableRow};

/// Text content with runs of whitespace collapsed to one space.
fn clean_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

// ============================================================================
// Images
// ============================================================================

pub(super) fn images(html: &Html, base_url: Option<&Url>) -> Vec<Image> {
    let Some(img) = selector("img") else {
        return Vec::new();
    };
    html.select(&img)
        .map(|el| {
            let attr = |name: &str| el.value().attr(name).unwrap_or_default().trim().to_string();
            let src = attr("src");
            Image {
                src: if src.is_empty() { src } else { absolutize(&src, base_url) },
                alt: attr("alt"),
                title: attr("title"),
                width: attr("width"),
                height: attr("height"),
            }
        })
        .collect()
}

// ============================================================================
// Tables
// ============================================================================

pub(super) fn tables(html: &Html) -> Vec<Table> {
    let (Some(table), Some(tr)) = (selector("table"), selector("tr")) else {
        return Vec::new();
    };
    html.select(&table)
        .filter_map(|el| parse_table(el, &tr))
        .collect()
}

/// Reads one table. Rows of nested tables belong to the nested table.
fn parse_table(table: ElementRef<'_>, tr: &Selector) -> Option<Table> {
    let (head, mut body): (Vec<_>, Vec<_>) = table
        .select(tr)
        .filter(|row| nearest(*row, "table").is_some_and(|t| t.id() == table.id()))
        .partition(|row| {
            row.ancestors()
                .take_while(|n| n.id() != table.id())
                .filter_map(ElementRef::wrap)
                .any(|el| el.value().name() == "thead")
        });

    let headers = if let Some(first) = head.first() {
        cells(*first, &["th", "td"])
    } else if body.first().is_some_and(|row| !cells(*row, &["th"]).is_empty()) {
        cells(body.remove(0), &["th"])
    } else {
        Vec::new()
    };

    let unique = headers.iter().collect::<IndexSet<_>>().len() == headers.len();
    let rows: Vec<TableRow> = body
        .into_iter()
        .map(|row| cells(row, &["th", "td"]))
        .filter(|cells| !cells.is_empty())
        .map(|cells| {
            if unique && !headers.is_empty() && cells.len() == headers.len() {
                TableRow::Keyed(headers.iter().cloned().zip(cells).collect())
            } else {
                TableRow::Cells(cells)
            }
        })
        .collect();

    (!rows.is_empty()).then_some(Table { headers, rows })
}

/// Texts of a row's direct cell children with one of `names`.
fn cells(row: ElementRef<'_>, names: &[&str]) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| names.contains(&cell.value().name()))
        .map(clean_text)
        .collect()
}

/// Closest ancestor element named `name`.
fn nearest<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
}

// ============================================================================
// Forms
// ============================================================================

pub(super) fn forms(html: &Html) -> Vec<Form> {
    let (Some(form), Some(field), Some(option)) = (
        selector("form"),
        selector("input, select, textarea"),
        selector("option"),
    ) else {
        return Vec::new();
    };
    html.select(&form)
        .map(|el| {
            let value = el.value();
            Form {
                action: value.attr("action").unwrap_or_default().trim().to_string(),
                method: value
                    .attr("method")
                    .map(|m| m.trim().to_ascii_lowercase())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "get".to_string()),
                id: value.attr("id").map(String::from),
                fields: el.select(&field).map(|f| form_field(f, &option)).collect(),
            }
        })
        .collect()
}

fn form_field(field: ElementRef<'_>, option: &Selector) -> FormField {
    let el = field.value();
    let attr = |name: &str| el.attr(name).map(String::from);

    let kind = match el.name() {
        "input" => el
            .attr("type")
            .map_or_else(|| "text".to_string(), str::to_ascii_lowercase),
        other => other.to_string(),
    };
    let options = if el.name() == "select" {
        field
            .select(option)
            .map(|o| {
                let text = clean_text(o);
                SelectOption {
                    value: o.value().attr("value").map_or_else(|| text.clone(), String::from),
                    text,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    FormField {
        kind,
        name: attr("name"),
        id: attr("id"),
        value: attr("value"),
        placeholder: attr("placeholder"),
        required: el.attr("required").is_some(),
        options,
    }
}

// ============================================================================
// Microdata
// ============================================================================

/// Top-level items are `itemscope` elements that are not themselves a
/// property of another item.
pub(super) fn microdata(html: &Html) -> IndexMap<String, Value> {
    let (Some(scope), Some(prop)) = (selector("[itemscope]"), selector("[itemprop]")) else {
        return IndexMap::new();
    };
    let mut items = IndexMap::new();
    for item in html.select(&scope) {
        if item.value().attr("itemprop").is_some() {
            continue;
        }
        let Some(kind) = item.value().attr("itemtype").map(type_name) else {
            continue;
        };
        push_value(&mut items, kind, microdata_item(item, &prop));
    }
    items
}

fn microdata_item(item: ElementRef<'_>, prop: &Selector) -> Value {
    let mut props: IndexMap<String, Value> = IndexMap::new();
    if let Some(kind) = item.value().attr("itemtype") {
        props.insert("@type".to_string(), Value::String(type_name(kind)));
    }
    if let Some(id) = item.value().attr("itemid") {
        props.insert("@id".to_string(), Value::String(id.to_string()));
    }

    for el in item.select(prop) {
        let owner = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().attr("itemscope").is_some());
        if owner.is_none_or(|o| o.id() != item.id()) {
            continue;
        }
        let value = if el.value().attr("itemscope").is_some() {
            microdata_item(el, prop)
        } else {
            Value::String(property_value(el))
        };
        for name in el.value().attr("itemprop").unwrap_or_default().split_whitespace() {
            push_value(&mut props, name.to_string(), value.clone());
        }
    }

    Value::Object(props.into_iter().collect::<Map<_, _>>())
}

/// Scalar property value, read from the attribute the element type carries.
fn property_value(el: ElementRef<'_>) -> String {
    let value = el.value();
    let attr = |name: &str| value.attr(name).unwrap_or_default().trim().to_string();
    match value.name() {
        "meta" => attr("content"),
        "a" | "area" | "link" => attr("href"),
        "img" | "audio" | "video" | "source" | "embed" | "iframe" | "track" => attr("src"),
        "object" => attr("data"),
        "data" | "meter" => attr("value"),
        "time" => value
            .attr("datetime")
            .map_or_else(|| clean_text(el), |d| d.trim().to_string()),
        _ => clean_text(el),
    }
}

/// `https://schema.org/Product` becomes `Product`.
fn type_name(itemtype: &str) -> String {
    let first = itemtype.split_whitespace().next().unwrap_or(itemtype);
    first
        .trim_end_matches('/')
        .rsplit(['/', '#'])
        .next()
        .unwrap_or(first)
        .to_string()
}

/// Inserts a value, turning repeated keys into an array.
fn push_value(map: &mut IndexMap<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(existing)) => existing.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}
