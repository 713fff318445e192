//! JSONPath subset over `serde_json` values.
//!
//! Supported: `$`, `.key`, `['key']`, `[n]` (negative counts from the end),
//! `[start:end]`, `[*]`, `.*`, and recursive descent (`..key`, `..*`,
//! `..[n]`). Paths without a leading `$` are read as dotted paths, so
//! `product.tags.0` and `$.product.tags[0]` select the same value.

use serde_json::Value;

use crate::error::CoreError;

/// A parsed JSONPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Wildcard,
    Index(i64),
    Slice(Option<i64>, Option<i64>),
    Descendant(Box<Segment>),
}

impl JsonPath {
    /// Parses a `$`-rooted JSONPath or a bare dotted path.
    pub fn parse(path: &str) -> Result<Self, CoreError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(CoreError::config("JSONPath cannot be empty"));
        }

        let rest = match path.strip_prefix('$') {
            Some(rest) => rest.to_string(),
            None if path.starts_with('[') => path.to_string(),
            None => format!(".{path}"),
        };

        parse_segments(&rest)
            .map(|segments| Self { segments })
            .map_err(|reason| CoreError::config(format!("Invalid JSONPath '{path}': {reason}")))
    }

    /// Selects every matching value, in document order.
    pub fn select<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            current = current
                .into_iter()
                .flat_map(|value| apply(segment, value))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

fn parse_segments(rest: &str) -> Result<Vec<Segment>, String> {
    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' if chars.get(i + 1) == Some(&'.') => {
                i += 2;
                let (child, next) = if chars.get(i) == Some(&'[') {
                    parse_bracket(&chars, i)?
                } else {
                    parse_name(&chars, i)?
                };
                segments.push(Segment::Descendant(Box::new(child)));
                i = next;
            }
            '.' => {
                let (segment, next) = parse_name(&chars, i + 1)?;
                segments.push(segment);
                i = next;
            }
            '[' => {
                let (segment, next) = parse_bracket(&chars, i)?;
                segments.push(segment);
                i = next;
            }
            other => return Err(format!("unexpected '{other}' at offset {i}")),
        }
    }

    Ok(segments)
}

fn parse_name(chars: &[char], start: usize) -> Result<(Segment, usize), String> {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        end += 1;
    }
    let name: String = chars[start..end].iter().collect();
    match name.as_str() {
        "" => Err(format!("empty key at offset {start}")),
        "*" => Ok((Segment::Wildcard, end)),
        _ => Ok((Segment::Key(name), end)),
    }
}

fn parse_bracket(chars: &[char], open: usize) -> Result<(Segment, usize), String> {
    let mut end = open + 1;
    let mut quote = None;
    while end < chars.len() {
        match (chars[end], quote) {
            (c @ ('\'' | '"'), None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (']', None) => break,
            _ => {}
        }
        end += 1;
    }
    if end >= chars.len() {
        return Err(format!("unclosed '[' at offset {open}"));
    }

    let inner: String = chars[open + 1..end].iter().collect();
    let inner = inner.trim();
    let segment = if inner == "*" {
        Segment::Wildcard
    } else if let Some(key) = unquote(inner) {
        Segment::Key(key.to_string())
    } else if let Some((start, stop)) = inner.split_once(':') {
        Segment::Slice(parse_bound(start)?, parse_bound(stop)?)
    } else {
        Segment::Index(
            inner
                .parse()
                .map_err(|_| format!("invalid index '{inner}'"))?,
        )
    };
    Ok((segment, end + 1))
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
}

fn parse_bound(s: &str) -> Result<Option<i64>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|_| format!("invalid slice bound '{s}'"))
}

fn apply<'v>(segment: &Segment, value: &'v Value) -> Vec<&'v Value> {
    match segment {
        Segment::Key(key) => match value {
            Value::Object(map) => map.get(key).into_iter().collect(),
            Value::Array(items) => key
                .parse::<i64>()
                .ok()
                .and_then(|i| index(items, i))
                .into_iter()
                .collect(),
            _ => Vec::new(),
        },
        Segment::Wildcard => match value {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        },
        Segment::Index(i) => match value {
            Value::Array(items) => index(items, *i).into_iter().collect(),
            _ => Vec::new(),
        },
        Segment::Slice(start, stop) => match value {
            Value::Array(items) => slice(items, *start, *stop),
            _ => Vec::new(),
        },
        Segment::Descendant(child) => {
            let mut nodes = Vec::new();
            collect_descendants(value, &mut nodes);
            nodes
                .into_iter()
                .flat_map(|node| apply(child, node))
                .collect()
        }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn resolve_index(len: usize, i: i64) -> i64 {
    if i < 0 { len as i64 + i } else { i }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn index(items: &[Value], i: i64) -> Option<&Value> {
    let i = resolve_index(items.len(), i);
    if i < 0 { None } else { items.get(i as usize) }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn slice(items: &[Value], start: Option<i64>, stop: Option<i64>) -> Vec<&Value> {
    let len = items.len() as i64;
    let clamp = |i: i64| resolve_index(items.len(), i).clamp(0, len);
    let start = start.map_or(0, clamp);
    let stop = stop.map_or(len, clamp);
    if start >= stop {
        return Vec::new();
    }
    items[start as usize..stop as usize].iter().collect()
}

fn collect_descendants<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    out.push(value);
    match value {
        Value::Object(map) => map.values().for_each(|v| collect_descendants(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
