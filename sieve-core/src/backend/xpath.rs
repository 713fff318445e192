//! XPath evaluation over `scraper` documents.
//!
//! `scraper` only speaks CSS, so this module carries a small XPath 1.0
//! evaluator covering what extraction rules use in practice:
//!
//! - absolute and relative location paths with `/` and `//`
//! - name tests, `*`, `.`, `..`, `@attr`, `@*`, and `text()`
//! - predicates with positions, `last()`, `position()`, comparisons
//!   (`=`, `!=`, `<`, `<=`, `>`, `>=`), `and`, `or`, and parentheses
//! - `contains()`, `starts-with()`, `not()`, `normalize-space()`,
//!   `count()`, and `string()`
//! - unions with `|`
//!
//! Relative top-level paths are evaluated against the `<html>` element.
//! Element results come back in document order without duplicates.

use std::cell::OnceCell;
use std::collections::HashMap;

use scraper::node::Element;
use scraper::{ElementRef, Html};

use crate::error::CoreError;

// ============================================================================
// Public API
// ============================================================================

/// A parsed XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

/// One result of an XPath evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XItem<'a> {
    /// An element node.
    Element(ElementRef<'a>),
    /// A text node, attribute value, or scalar result.
    Value(String),
}

impl XPath {
    /// Parses an expression, rejecting anything outside the supported subset.
    pub fn parse(source: &str) -> Result<Self, CoreError> {
        let tokens = tokenize(source).map_err(|reason| invalid(source, &reason))?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(|reason| invalid(source, &reason))?;
        if let Some(token) = parser.peek() {
            return Err(invalid(source, &format!("unexpected {token:?}")));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression against a parsed document.
    pub fn select<'a>(&self, html: &'a Html) -> Vec<XItem<'a>> {
        let eval = Evaluator {
            html,
            order: OnceCell::new(),
        };
        let context = Item::Element(html.root_element());
        let ctx = Ctx {
            item: &context,
            position: 1,
            size: 1,
        };

        match eval.eval(&self.expr, &ctx) {
            XValue::Nodes(items) => items
                .into_iter()
                .map(|item| match item {
                    Item::Root => XItem::Element(html.root_element()),
                    Item::Element(el) => XItem::Element(el),
                    Item::Value(v) => XItem::Value(v),
                })
                .collect(),
            XValue::Str(s) => vec![XItem::Value(s)],
            XValue::Num(n) => vec![XItem::Value(format_number(n))],
            XValue::Bool(b) => vec![XItem::Value(b.to_string())],
        }
    }
}

fn invalid(source: &str, reason: &str) -> CoreError {
    CoreError::config(format!("Invalid XPath '{source}': {reason}"))
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Dot,
    DotDot,
    Star,
    Pipe,
    Comma,
    Cmp(CmpOp),
    Name(String),
    Literal(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (number, end) = read_number(&chars, i);
                tokens.push(Token::Number(number));
                i = end;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '<' | '>' => {
                let or_equal = next == Some('=');
                let op = match (c, or_equal) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                tokens.push(Token::Cmp(op));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| "unterminated string literal".to_string())?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + close].iter().collect()));
                i += close + 2;
            }
            c if c.is_ascii_digit() => {
                let (number, end) = read_number(&chars, i);
                tokens.push(Token::Number(number));
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unsupported character '{other}'")),
        }
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut end = start;
    let mut seen_dot = false;
    while end < chars.len() {
        match chars[end] {
            d if d.is_ascii_digit() => end += 1,
            '.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    let text: String = chars[start..end].iter().collect();
    (text.parse().unwrap_or(0.0), end)
}

// ============================================================================
// Syntax Tree
// ============================================================================

#[derive(Debug, Clone)]
enum Expr {
    Path(PathExpr),
    Union(Vec<Expr>),
    Literal(String),
    Number(f64),
    Call(Func, Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
struct PathExpr {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    /// Preceded by `//`.
    descendant: bool,
    kind: StepKind,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone)]
enum StepKind {
    Child(NameTest),
    Attribute(NameTest),
    Text,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Named(n) => n.eq_ignore_ascii_case(name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Contains,
    StartsWith,
    Not,
    Last,
    Position,
    NormalizeSpace,
    Count,
    String,
}

impl Func {
    fn lookup(name: &str) -> Option<(Self, usize, usize)> {
        Some(match name {
            "contains" => (Self::Contains, 2, 2),
            "starts-with" => (Self::StartsWith, 2, 2),
            "not" => (Self::Not, 1, 1),
            "last" => (Self::Last, 0, 0),
            "position" => (Self::Position, 0, 0),
            "normalize-space" => (Self::NormalizeSpace, 0, 1),
            "count" => (Self::Count, 1, 1),
            "string" => (Self::String, 0, 1),
            _ => return None,
        })
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(format!("expected {expected:?}, found {t:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_compare()?;
        while self.peek_keyword("and") {
            self.advance();
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr, String> {
        let left = self.parse_union()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_union()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_union(&mut self) -> Result<Expr, String> {
        let first = self.parse_primary()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            parts.push(self.parse_primary()?);
        }
        Ok(Expr::Union(parts))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Literal(s)) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name))
                if name != "text" && self.peek_at(1) == Some(&Token::LParen) =>
            {
                let name = name.clone();
                self.parse_call(&name)
            }
            Some(
                Token::Slash
                | Token::DoubleSlash
                | Token::Name(_)
                | Token::Star
                | Token::At
                | Token::Dot
                | Token::DotDot,
            ) => self.parse_path().map(Expr::Path),
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, String> {
        let (func, min, max) =
            Func::lookup(name).ok_or_else(|| format!("unsupported function '{name}()'"))?;
        self.advance();
        self.expect(&Token::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_or()?);
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        self.expect(&Token::RParen)?;

        if args.len() < min || args.len() > max {
            return Err(format!(
                "{name}() takes {min}..={max} arguments, got {}",
                args.len()
            ));
        }
        Ok(Expr::Call(func, args))
    }

    fn parse_path(&mut self) -> Result<PathExpr, String> {
        let mut absolute = false;
        let mut descendant = false;
        match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                absolute = true;
                if !self.at_step_start() {
                    return Ok(PathExpr {
                        absolute,
                        steps: Vec::new(),
                    });
                }
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                absolute = true;
                descendant = true;
            }
            _ => {}
        }

        let mut steps = Vec::new();
        loop {
            steps.push(self.parse_step(descendant)?);
            match self.peek() {
                Some(Token::Slash) => descendant = false,
                Some(Token::DoubleSlash) => descendant = true,
                _ => break,
            }
            self.advance();
        }
        Ok(PathExpr { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn parse_step(&mut self, descendant: bool) -> Result<Step, String> {
        let kind = match self.advance() {
            Some(Token::Dot) => StepKind::SelfNode,
            Some(Token::DotDot) => StepKind::Parent,
            Some(Token::Star) => StepKind::Child(NameTest::Any),
            Some(Token::At) => match self.advance() {
                Some(Token::Name(n)) => StepKind::Attribute(NameTest::Named(n)),
                Some(Token::Star) => StepKind::Attribute(NameTest::Any),
                _ => return Err("expected attribute name after '@'".to_string()),
            },
            Some(Token::Name(n)) if n == "text" => {
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                StepKind::Text
            }
            Some(Token::Name(n)) => StepKind::Child(NameTest::Named(n)),
            Some(t) => return Err(format!("unexpected {t:?} in location path")),
            None => return Err("location path ends after '/'".to_string()),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }

        Ok(Step {
            descendant,
            kind,
            predicates,
        })
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Item<'a> {
    Root,
    Element(ElementRef<'a>),
    Value(String),
}

enum XValue<'a> {
    Nodes(Vec<Item<'a>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Ctx<'a, 'c> {
    item: &'c Item<'a>,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    html: &'a Html,
    /// Pre-order index of every element, built on first use.
    order: OnceCell<HashMap<*const Element, usize>>,
}

impl<'a> Evaluator<'a> {
    fn eval(&self, expr: &Expr, ctx: &Ctx<'a, '_>) -> XValue<'a> {
        match expr {
            Expr::Path(path) => XValue::Nodes(self.eval_path(path, ctx.item)),
            Expr::Union(parts) => {
                let mut items = Vec::new();
                for part in parts {
                    if let XValue::Nodes(nodes) = self.eval(part, ctx) {
                        items.extend(nodes);
                    }
                }
                XValue::Nodes(self.document_order(items))
            }
            Expr::Literal(s) => XValue::Str(s.clone()),
            Expr::Number(n) => XValue::Num(*n),
            Expr::Call(func, args) => self.call(*func, args, ctx),
            Expr::Compare(op, left, right) => {
                let left = self.atoms(self.eval(left, ctx));
                let right = self.atoms(self.eval(right, ctx));
                XValue::Bool(
                    left.iter()
                        .any(|l| right.iter().any(|r| compare_atoms(*op, l, r))),
                )
            }
            Expr::And(left, right) => XValue::Bool(
                self.truthy(&self.eval(left, ctx)) && self.truthy(&self.eval(right, ctx)),
            ),
            Expr::Or(left, right) => XValue::Bool(
                self.truthy(&self.eval(left, ctx)) || self.truthy(&self.eval(right, ctx)),
            ),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn call(&self, func: Func, args: &[Expr], ctx: &Ctx<'a, '_>) -> XValue<'a> {
        let arg_string = |i: usize| -> String {
            match args.get(i) {
                Some(expr) => self.stringify(&self.eval(expr, ctx)),
                None => self.string_value(ctx.item),
            }
        };

        match func {
            Func::Contains => XValue::Bool(arg_string(0).contains(&arg_string(1))),
            Func::StartsWith => XValue::Bool(arg_string(0).starts_with(&arg_string(1))),
            Func::Not => XValue::Bool(!args.first().is_some_and(|a| self.truthy(&self.eval(a, ctx)))),
            Func::Last => XValue::Num(ctx.size as f64),
            Func::Position => XValue::Num(ctx.position as f64),
            Func::NormalizeSpace => XValue::Str(
                arg_string(0).split_whitespace().collect::<Vec<_>>().join(" "),
            ),
            Func::Count => match args.first().map(|a| self.eval(a, ctx)) {
                Some(XValue::Nodes(nodes)) => XValue::Num(nodes.len() as f64),
                _ => XValue::Num(0.0),
            },
            Func::String => XValue::Str(arg_string(0)),
        }
    }

    fn eval_path(&self, path: &PathExpr, context: &Item<'a>) -> Vec<Item<'a>> {
        let mut current = if path.absolute {
            vec![Item::Root]
        } else {
            vec![context.clone()]
        };
        for step in &path.steps {
            current = self.apply_step(step, current);
            if current.is_empty() {
                break;
            }
        }
        current
    }

    fn apply_step(&self, step: &Step, contexts: Vec<Item<'a>>) -> Vec<Item<'a>> {
        let contexts = if step.descendant {
            self.descendants_or_self(&contexts)
        } else {
            contexts
        };

        let mut out = Vec::new();
        for context in &contexts {
            let candidates: Vec<Item<'a>> = match &step.kind {
                StepKind::Child(test) => self
                    .children(context)
                    .into_iter()
                    .filter(|el| test.matches(el.value().name()))
                    .map(Item::Element)
                    .collect(),
                StepKind::Attribute(test) => match context {
                    Item::Element(el) => el
                        .value()
                        .attrs()
                        .filter(|(name, _)| test.matches(name))
                        .map(|(_, value)| Item::Value(value.to_string()))
                        .collect(),
                    _ => Vec::new(),
                },
                StepKind::Text => match context {
                    Item::Element(el) => el
                        .children()
                        .filter_map(|node| node.value().as_text().map(|t| Item::Value(t.to_string())))
                        .collect(),
                    _ => Vec::new(),
                },
                StepKind::SelfNode => vec![context.clone()],
                StepKind::Parent => match context {
                    Item::Element(el) => vec![
                        el.parent()
                            .and_then(ElementRef::wrap)
                            .map_or(Item::Root, Item::Element),
                    ],
                    _ => Vec::new(),
                },
            };
            out.extend(self.filter(&step.predicates, candidates));
        }
        self.document_order(out)
    }

    fn filter(&self, predicates: &[Expr], mut items: Vec<Item<'a>>) -> Vec<Item<'a>> {
        for predicate in predicates {
            let size = items.len();
            items = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let ctx = Ctx {
                        item: &item,
                        position: i + 1,
                        size,
                    };
                    let keep = match self.eval(predicate, &ctx) {
                        #[allow(clippy::cast_precision_loss)]
                        XValue::Num(n) => (n - (i + 1) as f64).abs() < f64::EPSILON,
                        other => self.truthy(&other),
                    };
                    keep.then_some(item)
                })
                .collect();
        }
        items
    }

    fn children(&self, item: &Item<'a>) -> Vec<ElementRef<'a>> {
        match item {
            Item::Root => vec![self.html.root_element()],
            Item::Element(el) => el.children().filter_map(ElementRef::wrap).collect(),
            Item::Value(_) => Vec::new(),
        }
    }

    fn descendants_or_self(&self, items: &[Item<'a>]) -> Vec<Item<'a>> {
        let mut out = Vec::new();
        for item in items {
            match item {
                Item::Root => {
                    out.push(Item::Root);
                    out.extend(
                        self.html
                            .root_element()
                            .descendants()
                            .filter_map(ElementRef::wrap)
                            .map(Item::Element),
                    );
                }
                Item::Element(el) => {
                    out.extend(el.descendants().filter_map(ElementRef::wrap).map(Item::Element));
                }
                Item::Value(_) => out.push(item.clone()),
            }
        }
        self.document_order(out)
    }

    /// Sorts element results into document order and drops duplicates.
    ///
    /// Sequences containing values (text or attributes) keep their evaluation
    /// order, which already follows the order of their context nodes.
    fn document_order(&self, mut items: Vec<Item<'a>>) -> Vec<Item<'a>> {
        if items.iter().any(|item| matches!(item, Item::Value(_))) {
            return items;
        }
        let ordered = items
            .windows(2)
            .all(|pair| self.position(&pair[0]) < self.position(&pair[1]));
        if !ordered {
            items.sort_by_key(|item| self.position(item));
            items.dedup();
        }
        items
    }

    fn position(&self, item: &Item<'a>) -> usize {
        match item {
            Item::Element(el) => self
                .order
                .get_or_init(|| {
                    self.html
                        .tree
                        .root()
                        .descendants()
                        .filter_map(|node| node.value().as_element())
                        .enumerate()
                        .map(|(i, element)| (std::ptr::from_ref(element), i + 1))
                        .collect()
                })
                .get(&std::ptr::from_ref(el.value()))
                .copied()
                .unwrap_or(usize::MAX),
            Item::Root | Item::Value(_) => 0,
        }
    }

    fn string_value(&self, item: &Item<'a>) -> String {
        match item {
            Item::Root => self.html.root_element().text().collect(),
            Item::Element(el) => el.text().collect(),
            Item::Value(v) => v.clone(),
        }
    }

    fn stringify(&self, value: &XValue<'a>) -> String {
        match value {
            XValue::Nodes(items) => items
                .first()
                .map(|item| self.string_value(item))
                .unwrap_or_default(),
            XValue::Str(s) => s.clone(),
            XValue::Num(n) => format_number(*n),
            XValue::Bool(b) => b.to_string(),
        }
    }

    fn truthy(&self, value: &XValue<'a>) -> bool {
        match value {
            XValue::Nodes(items) => !items.is_empty(),
            XValue::Str(s) => !s.is_empty(),
            XValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XValue::Bool(b) => *b,
        }
    }

    fn atoms(&self, value: XValue<'a>) -> Vec<Atom> {
        match value {
            XValue::Nodes(items) => items
                .iter()
                .map(|item| Atom::Str(self.string_value(item)))
                .collect(),
            XValue::Str(s) => vec![Atom::Str(s)],
            XValue::Num(n) => vec![Atom::Num(n)],
            XValue::Bool(b) => vec![Atom::Bool(b)],
        }
    }
}

fn compare_atoms(op: CmpOp, left: &Atom, right: &Atom) -> bool {
    let as_bool = |atom: &Atom| match atom {
        Atom::Bool(b) => *b,
        Atom::Num(n) => *n != 0.0,
        Atom::Str(s) => !s.is_empty(),
    };
    let as_num = |atom: &Atom| match atom {
        Atom::Num(n) => *n,
        Atom::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        Atom::Bool(b) => f64::from(u8::from(*b)),
    };

    let relational = matches!(op, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge);
    if !relational && (matches!(left, Atom::Bool(_)) || matches!(right, Atom::Bool(_))) {
        let equal = as_bool(left) == as_bool(right);
        return if op == CmpOp::Eq { equal } else { !equal };
    }
    if relational || matches!(left, Atom::Num(_)) || matches!(right, Atom::Num(_)) {
        let (l, r) = (as_num(left), as_num(right));
        return match op {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
        };
    }
    match (left, right) {
        (Atom::Str(l), Atom::Str(r)) if op == CmpOp::Eq => l == r,
        (Atom::Str(l), Atom::Str(r)) => l != r,
        _ => false,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
