use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured fields extracted from one record body.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Typed field values produced by the normalizer.
///
/// Grok captures always arrive as `Text`; JSON bodies keep their native types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Extract as string, returning None for anything but `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view: numbers directly, text when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Scalar rendering used for string matchers. Lists and maps have none.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            FieldValue::Null => Some(String::new()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(format_number(*n)),
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::List(_) | FieldValue::Map(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }
}

/// Look up `path` in a field map. A literal key wins; otherwise dotted
/// segments descend into nested maps (`Event.System.EventID`).
pub fn lookup<'a>(fields: &'a FieldMap, path: &str) -> Option<&'a FieldValue> {
    if let Some(v) = fields.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        match current {
            FieldValue::Map(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Render integral floats without a fractional part (`4625`, not `4625.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scalar_string() {
            Some(s) => f.write_str(&s),
            None => write!(f, "<{}>", self.type_name()),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Map(
                map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_converts_recursively() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a":{"b":[1,"x",null]},"c":true}"#).unwrap();
        let FieldValue::Map(map) = FieldValue::from(json) else {
            panic!("expected map");
        };
        assert_eq!(map.get("c"), Some(&FieldValue::Bool(true)));
        let inner = lookup(&map, "a.b").unwrap();
        assert_eq!(
            inner,
            &FieldValue::List(vec![
                FieldValue::Number(1.0),
                FieldValue::Text("x".into()),
                FieldValue::Null
            ])
        );
    }

    #[test]
    fn literal_dotted_key_wins_over_path() {
        let mut fields = FieldMap::new();
        fields.insert("a.b".into(), FieldValue::from("literal"));
        assert_eq!(lookup(&fields, "a.b").and_then(|v| v.as_str()), Some("literal"));
        assert!(lookup(&fields, "a.c").is_none());
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(FieldValue::Number(4625.0).scalar_string().unwrap(), "4625");
        assert_eq!(FieldValue::Number(1.5).scalar_string().unwrap(), "1.5");
        assert!(FieldValue::List(vec![]).scalar_string().is_none());
        assert_eq!(FieldValue::from("42").as_f64(), Some(42.0));
    }
}
