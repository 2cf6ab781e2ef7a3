//! Field matchers: the leaves of a rule's detection tree.
//!
//! A selection is either a list of field maps (OR across maps, AND across the
//! fields inside one map) or a list of keywords. Each field entry may carry
//! modifiers after a `|`:
//!
//! | modifier     | effect                                            |
//! |--------------|---------------------------------------------------|
//! | `contains`   | value must occur anywhere in the field            |
//! | `startswith` | value must prefix the field                       |
//! | `endswith`   | value must suffix the field                       |
//! | `re`         | value is a regular expression                     |
//! | `all`        | every listed value must match (default: any)      |
//! | `exists`     | `true`/`false`: field presence test               |
//! | `cased`      | accepted for compatibility; matching is cased     |
//!
//! Plain string values support `*` and `?` wildcards (`\*` for a literal).
//! All comparisons are case-sensitive.

use regex::Regex;
use serde_yaml::Value;

use logeye_core::{FieldMap, FieldValue};

use crate::field_config::FieldConfig;

/// A single rule's failure to evaluate against a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("field '{field}' has unsupported type {type_name} for this matcher")]
    UnsupportedType { field: String, type_name: &'static str },

    #[error("condition references unknown selection '{0}'")]
    UnknownSelection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringOp {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

/// Compiled form of one expected value.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    Null,
    Bool(bool),
    Number(f64),
    Literal(String),
    Pattern(Regex),
}

impl ValueMatcher {
    fn matches_scalar(&self, value: &FieldValue) -> bool {
        match self {
            ValueMatcher::Null => value.is_null(),
            ValueMatcher::Bool(expected) => match value {
                FieldValue::Bool(b) => b == expected,
                FieldValue::Text(s) => s == if *expected { "true" } else { "false" },
                _ => false,
            },
            ValueMatcher::Number(expected) => match value {
                FieldValue::Number(n) => n == expected,
                FieldValue::Text(s) => s.trim().parse::<f64>().map_or(false, |n| n == *expected),
                _ => false,
            },
            ValueMatcher::Literal(expected) => value
                .scalar_string()
                .map_or(false, |actual| &actual == expected),
            ValueMatcher::Pattern(re) => value
                .scalar_string()
                .map_or(false, |actual| re.is_match(&actual)),
        }
    }
}

/// One `field|modifiers: values` entry.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    pub field: String,
    values: Vec<ValueMatcher>,
    match_all: bool,
    exists: Option<bool>,
}

impl FieldMatcher {
    pub fn matches(&self, fields: &FieldMap, config: &FieldConfig) -> Result<bool, EvalError> {
        let found = config.resolve(fields, &self.field);

        if let Some(expected) = self.exists {
            return Ok(found.is_some() == expected);
        }

        let Some(value) = found else {
            // A missing field only satisfies an explicit `null` expectation.
            return Ok(self.values.iter().any(|v| matches!(v, ValueMatcher::Null)));
        };

        let check = |matcher: &ValueMatcher| -> Result<bool, EvalError> {
            match value {
                FieldValue::List(items) => Ok(items.iter().any(|item| matcher.matches_scalar(item))),
                FieldValue::Map(_) => Err(EvalError::UnsupportedType {
                    field: self.field.clone(),
                    type_name: value.type_name(),
                }),
                scalar => Ok(matcher.matches_scalar(scalar)),
            }
        };

        if self.match_all {
            for matcher in &self.values {
                if !check(matcher)? {
                    return Ok(false);
                }
            }
            Ok(true)
        } else {
            for matcher in &self.values {
                if check(matcher)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// A named block under `detection`.
#[derive(Debug, Clone)]
pub enum Selection {
    /// OR across maps; AND across the matchers inside each map.
    Maps(Vec<Vec<FieldMatcher>>),
    /// Free-text keywords matched (as `contains`) against every scalar field.
    Keywords(Vec<ValueMatcher>),
}

impl Selection {
    pub fn matches(&self, fields: &FieldMap, config: &FieldConfig) -> Result<bool, EvalError> {
        match self {
            Selection::Maps(maps) => {
                for map in maps {
                    let mut all = true;
                    for matcher in map {
                        if !matcher.matches(fields, config)? {
                            all = false;
                            break;
                        }
                    }
                    if all {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Selection::Keywords(keywords) => Ok(keywords
                .iter()
                .any(|kw| fields.values().any(|v| keyword_matches(kw, v)))),
        }
    }
}

fn keyword_matches(keyword: &ValueMatcher, value: &FieldValue) -> bool {
    match value {
        FieldValue::List(items) => items.iter().any(|item| keyword_matches(keyword, item)),
        FieldValue::Map(inner) => inner.values().any(|item| keyword_matches(keyword, item)),
        scalar => keyword.matches_scalar(scalar),
    }
}

// ── Compilation from YAML ───────────────────────────────────────────

/// Compile one selection body.
pub fn compile_selection(name: &str, body: &Value) -> Result<Selection, String> {
    match body {
        Value::Mapping(map) => Ok(Selection::Maps(vec![compile_map(name, map)?])),
        Value::Sequence(items) if items.iter().all(|i| i.is_mapping()) && !items.is_empty() => {
            let mut maps = Vec::with_capacity(items.len());
            for item in items {
                if let Value::Mapping(map) = item {
                    maps.push(compile_map(name, map)?);
                }
            }
            Ok(Selection::Maps(maps))
        }
        Value::Sequence(items) => {
            let mut keywords = Vec::with_capacity(items.len());
            for item in items {
                keywords.push(compile_value(item, StringOp::Contains)?);
            }
            Ok(Selection::Keywords(keywords))
        }
        scalar @ (Value::String(_) | Value::Number(_)) => {
            Ok(Selection::Keywords(vec![compile_value(scalar, StringOp::Contains)?]))
        }
        other => Err(format!(
            "selection '{}' must be a map, a list of maps, or keywords (got {:?})",
            name, other
        )),
    }
}

fn compile_map(selection: &str, map: &serde_yaml::Mapping) -> Result<Vec<FieldMatcher>, String> {
    let mut matchers = Vec::with_capacity(map.len());
    for (key, value) in map {
        let key = key
            .as_str()
            .ok_or_else(|| format!("selection '{}' has a non-string field name", selection))?;
        matchers.push(compile_field(key, value)?);
    }
    Ok(matchers)
}

fn compile_field(key: &str, value: &Value) -> Result<FieldMatcher, String> {
    let mut parts = key.split('|');
    let field = parts.next().unwrap_or_default().to_string();
    if field.is_empty() {
        return Err(format!("empty field name in '{}'", key));
    }

    let mut op = StringOp::Exact;
    let mut match_all = false;
    let mut exists = false;
    for modifier in parts {
        match modifier {
            "contains" => op = StringOp::Contains,
            "startswith" => op = StringOp::StartsWith,
            "endswith" => op = StringOp::EndsWith,
            "re" => op = StringOp::Regex,
            "all" => match_all = true,
            "exists" => exists = true,
            "cased" => {}
            other => return Err(format!("unsupported modifier '{}' on field '{}'", other, field)),
        }
    }

    if exists {
        let expected = value
            .as_bool()
            .ok_or_else(|| format!("'{}|exists' expects true or false", field))?;
        return Ok(FieldMatcher {
            field,
            values: Vec::new(),
            match_all: false,
            exists: Some(expected),
        });
    }

    let raw_values: Vec<&Value> = match value {
        Value::Sequence(items) => items.iter().collect(),
        single => vec![single],
    };
    if raw_values.is_empty() {
        return Err(format!("field '{}' has an empty value list", field));
    }

    let mut values = Vec::with_capacity(raw_values.len());
    for raw in raw_values {
        values.push(compile_value(raw, op)?);
    }

    Ok(FieldMatcher {
        field,
        values,
        match_all,
        exists: None,
    })
}

fn compile_value(value: &Value, op: StringOp) -> Result<ValueMatcher, String> {
    match value {
        Value::Null => Ok(ValueMatcher::Null),
        Value::Bool(b) if op == StringOp::Exact => Ok(ValueMatcher::Bool(*b)),
        Value::Number(n) if op == StringOp::Exact => n
            .as_f64()
            .map(ValueMatcher::Number)
            .ok_or_else(|| format!("unsupported number {:?}", n)),
        Value::Bool(b) => compile_string(&b.to_string(), op),
        Value::Number(n) => compile_string(&n.to_string(), op),
        Value::String(s) => compile_string(s, op),
        other => Err(format!("unsupported match value {:?}", other)),
    }
}

fn compile_string(pattern: &str, op: StringOp) -> Result<ValueMatcher, String> {
    if op == StringOp::Regex {
        return Regex::new(pattern)
            .map(ValueMatcher::Pattern)
            .map_err(|e| format!("invalid regex '{}': {}", pattern, e));
    }

    let body = wildcard_to_regex(pattern);
    let has_wildcard = body.1;
    if op == StringOp::Exact && !has_wildcard {
        return Ok(ValueMatcher::Literal(unescape(pattern)));
    }

    let anchored = match op {
        StringOp::Exact => format!("^{}$", body.0),
        StringOp::Contains => body.0,
        StringOp::StartsWith => format!("^{}", body.0),
        StringOp::EndsWith => format!("{}$", body.0),
        StringOp::Regex => unreachable!("handled above"),
    };
    Regex::new(&format!("(?s){}", anchored))
        .map(ValueMatcher::Pattern)
        .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
}

/// Translate `*`/`?` wildcards into regex syntax. Returns the regex body and
/// whether any unescaped wildcard was present.
fn wildcard_to_regex(pattern: &str) -> (String, bool) {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut has_wildcard = false;
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.peek() {
                Some('*') | Some('?') | Some('\\') => {
                    let escaped = chars.next().unwrap_or('\\');
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
                _ => out.push_str(&regex::escape("\\")),
            },
            '*' => {
                has_wildcard = true;
                out.push_str(".*");
            }
            '?' => {
                has_wildcard = true;
                out.push('.');
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    (out, has_wildcard)
}

fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '*' | '?' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}
