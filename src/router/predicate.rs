//! Predicate compilation and evaluation.
//!
//! Mixing two predicate syntaxes and inferring which one applied from
//! shape alone invites ambiguity, so this implementation pins the
//! discriminator explicitly via [`crate::model::PredicateSpec`]'s `kind`
//! tag: the runtime never guesses between `true` | `regex` | `expr`.
//! Predicates are compiled once, at route insertion, and cached in the
//! route table snapshot — never recompiled on the hot path.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::RouterError;
use crate::model::{Event, PredicateSpec, Value};

/// A compiled, ready-to-evaluate predicate.
#[derive(Debug, Clone)]
pub enum CompiledPredicate {
    True,
    Regex(Regex),
    Expr(ExprNode),
}

impl CompiledPredicate {
    pub fn compile(spec: &PredicateSpec) -> Result<Self, RouterError> {
        match spec {
            PredicateSpec::True => Ok(CompiledPredicate::True),
            PredicateSpec::Regex { pattern } => Regex::new(pattern)
                .map(CompiledPredicate::Regex)
                .map_err(|e| RouterError::PredicateCompile(e.to_string())),
            PredicateSpec::Expr { source } => {
                parse_expr(source).map(CompiledPredicate::Expr)
            }
        }
    }

    /// Evaluate against an event. On a regex match, named captures are
    /// exported into `event` unless the key is already present, so
    /// re-evaluating the same predicate twice never overwrites a field a
    /// prior pass already set. Runtime evaluation failures are treated as
    /// `false` and counted by the caller, never propagated.
    pub fn evaluate(&self, event: &mut Event) -> bool {
        match self {
            CompiledPredicate::True => true,
            CompiledPredicate::Regex(re) => {
                let raw = event.raw().to_string();
                match re.captures(&raw) {
                    Some(caps) => {
                        for name in re.capture_names().flatten() {
                            if let Some(m) = caps.name(name) {
                                event.insert_if_absent(name, Value::Str(m.as_str().to_string()));
                            }
                        }
                        true
                    }
                    None => false,
                }
            }
            CompiledPredicate::Expr(node) => {
                eval_expr(node, event).map(|v| v.truthy()).unwrap_or(false)
            }
        }
    }
}

// ---------------------------------------------------------------------
// Bounded JS-like expression language: ==, !=, &&, ||, !, includes(),
// JSON.parse(x).field, string/number/bool literals, and field references
// (bare identifiers look up `_raw` or an already-parsed event field).
// No side effects, no loops, no I/O — a small recursive-descent parser
// over a flat token stream is enough.
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ExprNode {
    Lit(ExprValue),
    Field(String),
    Raw,
    Not(Box<ExprNode>),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
    Eq(Box<ExprNode>, Box<ExprNode>),
    NotEq(Box<ExprNode>, Box<ExprNode>),
    Includes(Box<ExprNode>, Box<ExprNode>),
    JsonParseField(Box<ExprNode>, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Bool(bool),
    Num(f64),
    Str(String),
    Null,
}

impl ExprValue {
    fn truthy(&self) -> bool {
        match self {
            ExprValue::Bool(b) => *b,
            ExprValue::Num(n) => *n != 0.0,
            ExprValue::Str(s) => !s.is_empty(),
            ExprValue::Null => false,
        }
    }
}

fn parse_expr(source: &str) -> Result<ExprNode, RouterError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(RouterError::PredicateCompile(format!(
            "unexpected trailing tokens in expression: {source}"
        )));
    }
    Ok(node)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    And,
    Or,
    Not,
    EqEq,
    NotEq,
    Dot,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, RouterError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                toks.push(Tok::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                toks.push(Tok::Or);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::NotEq);
                i += 2;
            }
            '!' => {
                toks.push(Tok::Not);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        s.push(chars[i + 1]);
                        i += 2;
                    } else {
                        s.push(chars[i]);
                        i += 1;
                    }
                }
                if i >= chars.len() {
                    return Err(RouterError::PredicateCompile("unterminated string".into()));
                }
                i += 1;
                toks.push(Tok::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| RouterError::PredicateCompile(format!("bad number: {text}")))?;
                toks.push(Tok::Num(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(Tok::Ident(text));
            }
            other => {
                return Err(RouterError::PredicateCompile(format!(
                    "unexpected character '{other}' in expression"
                )))
            }
        }
    }
    Ok(toks)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<ExprNode, RouterError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::Or)) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = ExprNode::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ExprNode, RouterError> {
        let mut lhs = self.parse_eq()?;
        while matches!(self.peek(), Some(Tok::And)) {
            self.next();
            let rhs = self.parse_eq()?;
            lhs = ExprNode::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> Result<ExprNode, RouterError> {
        let lhs = self.parse_unary()?;
        match self.peek() {
            Some(Tok::EqEq) => {
                self.next();
                let rhs = self.parse_unary()?;
                Ok(ExprNode::Eq(Box::new(lhs), Box::new(rhs)))
            }
            Some(Tok::NotEq) => {
                self.next();
                let rhs = self.parse_unary()?;
                Ok(ExprNode::NotEq(Box::new(lhs), Box::new(rhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<ExprNode, RouterError> {
        if matches!(self.peek(), Some(Tok::Not)) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(ExprNode::Not(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExprNode, RouterError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.next();
                    let field = match self.next() {
                        Some(Tok::Ident(name)) => name,
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected field name after '.', got {other:?}"
                            )))
                        }
                    };
                    node = ExprNode::JsonParseField(Box::new(node), field);
                }
                Some(Tok::LParen) => {
                    // Only `includes(arg)` method call is recognized, and
                    // only directly after a field/raw reference.
                    self.next();
                    let arg = self.parse_or()?;
                    match self.next() {
                        Some(Tok::RParen) => {}
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected ')' got {other:?}"
                            )))
                        }
                    }
                    node = ExprNode::Includes(Box::new(node), Box::new(arg));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<ExprNode, RouterError> {
        match self.next() {
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(inner),
                    other => Err(RouterError::PredicateCompile(format!(
                        "expected ')' got {other:?}"
                    ))),
                }
            }
            Some(Tok::Str(s)) => Ok(ExprNode::Lit(ExprValue::Str(s))),
            Some(Tok::Num(n)) => Ok(ExprNode::Lit(ExprValue::Num(n))),
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(ExprNode::Lit(ExprValue::Bool(true))),
                "false" => Ok(ExprNode::Lit(ExprValue::Bool(false))),
                "null" => Ok(ExprNode::Lit(ExprValue::Null)),
                "_raw" => Ok(ExprNode::Raw),
                "JSON" => {
                    // JSON.parse(x).field
                    match self.next() {
                        Some(Tok::Dot) => {}
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected '.' after JSON, got {other:?}"
                            )))
                        }
                    }
                    match self.next() {
                        Some(Tok::Ident(ident)) if ident == "parse" => {}
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected 'parse' after JSON., got {other:?}"
                            )))
                        }
                    }
                    match self.next() {
                        Some(Tok::LParen) => {}
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected '(' got {other:?}"
                            )))
                        }
                    }
                    let arg = self.parse_or()?;
                    match self.next() {
                        Some(Tok::RParen) => {}
                        other => {
                            return Err(RouterError::PredicateCompile(format!(
                                "expected ')' got {other:?}"
                            )))
                        }
                    }
                    // the postfix loop will attach `.field` next
                    Ok(arg)
                }
                other => Ok(ExprNode::Field(other.to_string())),
            },
            other => Err(RouterError::PredicateCompile(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

fn eval_expr(node: &ExprNode, event: &Event) -> Option<ExprValue> {
    match node {
        ExprNode::Lit(v) => Some(v.clone()),
        ExprNode::Raw => Some(ExprValue::Str(event.raw().to_string())),
        ExprNode::Field(name) => event.get(name).map(value_to_expr),
        ExprNode::Not(inner) => eval_expr(inner, event).map(|v| ExprValue::Bool(!v.truthy())),
        ExprNode::And(a, b) => {
            let lhs = eval_expr(a, event)?;
            if !lhs.truthy() {
                return Some(ExprValue::Bool(false));
            }
            eval_expr(b, event).map(|v| ExprValue::Bool(v.truthy()))
        }
        ExprNode::Or(a, b) => {
            let lhs = eval_expr(a, event)?;
            if lhs.truthy() {
                return Some(ExprValue::Bool(true));
            }
            eval_expr(b, event).map(|v| ExprValue::Bool(v.truthy()))
        }
        ExprNode::Eq(a, b) => {
            let lhs = eval_expr(a, event)?;
            let rhs = eval_expr(b, event)?;
            Some(ExprValue::Bool(expr_eq(&lhs, &rhs)))
        }
        ExprNode::NotEq(a, b) => {
            let lhs = eval_expr(a, event)?;
            let rhs = eval_expr(b, event)?;
            Some(ExprValue::Bool(!expr_eq(&lhs, &rhs)))
        }
        ExprNode::Includes(a, b) => {
            let lhs = eval_expr(a, event)?;
            let rhs = eval_expr(b, event)?;
            let (ExprValue::Str(haystack), ExprValue::Str(needle)) = (lhs, rhs) else {
                return None;
            };
            Some(ExprValue::Bool(haystack.contains(&needle)))
        }
        ExprNode::JsonParseField(inner, field) => {
            let val = eval_expr(inner, event)?;
            let ExprValue::Str(text) = val else { return None };
            let parsed: JsonValue = serde_json::from_str(&text).ok()?;
            json_field_to_expr(&parsed, field)
        }
    }
}

fn expr_eq(a: &ExprValue, b: &ExprValue) -> bool {
    match (a, b) {
        (ExprValue::Str(x), ExprValue::Str(y)) => x == y,
        (ExprValue::Num(x), ExprValue::Num(y)) => x == y,
        (ExprValue::Bool(x), ExprValue::Bool(y)) => x == y,
        (ExprValue::Null, ExprValue::Null) => true,
        // Loose-ish numeric/string comparison, mirroring JS `==` just
        // enough to compare a parsed JSON field against a string literal.
        (ExprValue::Str(x), ExprValue::Num(y)) | (ExprValue::Num(y), ExprValue::Str(x)) => {
            x.parse::<f64>().map(|n| n == *y).unwrap_or(false)
        }
        _ => false,
    }
}

fn value_to_expr(v: &Value) -> ExprValue {
    match v {
        Value::Str(s) => ExprValue::Str(s.clone()),
        Value::Int(i) => ExprValue::Num(*i as f64),
        Value::Float(f) => ExprValue::Num(*f),
        Value::Bool(b) => ExprValue::Bool(*b),
        Value::Null => ExprValue::Null,
        _ => ExprValue::Str(serde_json::to_string(v).unwrap_or_default()),
    }
}

fn json_field_to_expr(val: &JsonValue, field: &str) -> Option<ExprValue> {
    let mapped: BTreeMap<String, JsonValue> = val.as_object()?.clone().into_iter().collect();
    let field_val = mapped.get(field)?;
    Some(match field_val {
        JsonValue::String(s) => ExprValue::Str(s.clone()),
        JsonValue::Number(n) => ExprValue::Num(n.as_f64().unwrap_or(0.0)),
        JsonValue::Bool(b) => ExprValue::Bool(*b),
        JsonValue::Null => ExprValue::Null,
        other => ExprValue::Str(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventMeta;

    fn ev(raw: &str) -> Event {
        Event::from_raw(raw, EventMeta::new("s1"))
    }

    #[test]
    fn true_predicate_always_matches() {
        let mut e = ev("anything");
        let p = CompiledPredicate::compile(&PredicateSpec::True).unwrap();
        assert!(p.evaluate(&mut e));
    }

    #[test]
    fn regex_exports_named_captures_without_overwrite() {
        let spec = PredicateSpec::Regex {
            pattern: r"user=(?P<user>\w+)".to_string(),
        };
        let p = CompiledPredicate::compile(&spec).unwrap();
        let mut e = ev("user=alice action=login");
        e.insert("user", Value::Str("preexisting".into()));
        assert!(p.evaluate(&mut e));
        assert_eq!(e.get("user").unwrap().as_str(), Some("preexisting"));
    }

    #[test]
    fn regex_no_match_is_false() {
        let spec = PredicateSpec::Regex {
            pattern: r"AUDIT".to_string(),
        };
        let p = CompiledPredicate::compile(&spec).unwrap();
        let mut e = ev("INFO nothing interesting");
        assert!(!p.evaluate(&mut e));
    }

    #[test]
    fn expr_includes_and_equality() {
        let spec = PredicateSpec::Expr {
            source: r#"_raw.includes('AUDIT') && severity == 'high'"#.to_string(),
        };
        let p = CompiledPredicate::compile(&spec).unwrap();
        let mut e = ev("this is an AUDIT record");
        e.insert("severity", Value::Str("high".into()));
        assert!(p.evaluate(&mut e));
    }

    #[test]
    fn expr_json_parse_field() {
        let spec = PredicateSpec::Expr {
            source: r#"JSON.parse(message).level == 'critical'"#.to_string(),
        };
        let p = CompiledPredicate::compile(&spec).unwrap();
        let mut e = ev("irrelevant");
        e.insert("message", Value::Str(r#"{"level":"critical"}"#.into()));
        assert!(p.evaluate(&mut e));
    }

    #[test]
    fn bad_regex_fails_at_compile_time() {
        let spec = PredicateSpec::Regex {
            pattern: "(unclosed".to_string(),
        };
        assert!(CompiledPredicate::compile(&spec).is_err());
    }
}
