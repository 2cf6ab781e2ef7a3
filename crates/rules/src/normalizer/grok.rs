//! Grok pattern compiler.
//!
//! `%{NAME}` inlines a named definition, `%{NAME:field}` also captures the
//! match into `field`, and `%{NAME:field:int}` / `%{NAME:field:float}`
//! converts the capture to a number. Definitions may reference each other.

use std::collections::HashMap;

use regex::Regex;

use logeye_core::{FieldMap, FieldValue};

const MAX_DEPTH: usize = 32;

const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("USERNAME", r"[a-zA-Z0-9._-]+"),
    ("USER", r"%{USERNAME}"),
    ("INT", r"(?:[+-]?(?:[0-9]+))"),
    ("BASE10NUM", r"(?:[+-]?(?:[0-9]+(?:\.[0-9]+)?|\.[0-9]+))"),
    ("NUMBER", r"(?:%{BASE10NUM})"),
    ("POSINT", r"\b(?:[1-9][0-9]*)\b"),
    ("NONNEGINT", r"\b(?:[0-9]+)\b"),
    ("WORD", r"\b\w+\b"),
    ("NOTSPACE", r"\S+"),
    ("SPACE", r"\s*"),
    ("DATA", r".*?"),
    ("GREEDYDATA", r".*"),
    ("QUOTEDSTRING", r#""(?:[^"\\]|\\.)*""#),
    ("UUID", r"[A-Fa-f0-9]{8}-(?:[A-Fa-f0-9]{4}-){3}[A-Fa-f0-9]{12}"),
    ("MAC", r"(?:[A-Fa-f0-9]{2}[:-]){5}[A-Fa-f0-9]{2}"),
    (
        "IPV4",
        r"(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])",
    ),
    ("IPV6", r"(?:[A-Fa-f0-9]{0,4}:){2,7}[A-Fa-f0-9]{0,4}"),
    ("IP", r"(?:%{IPV6}|%{IPV4})"),
    (
        "HOSTNAME",
        r"\b(?:[0-9A-Za-z][0-9A-Za-z-]{0,62})(?:\.(?:[0-9A-Za-z][0-9A-Za-z-]{0,62}))*\.?",
    ),
    ("IPORHOST", r"(?:%{IP}|%{HOSTNAME})"),
    ("HOSTPORT", r"%{IPORHOST}:%{POSINT}"),
    ("UNIXPATH", r"(?:/[\w%!$@:.,+~-]*)+"),
    ("PATH", r"%{UNIXPATH}"),
    (
        "MONTH",
        r"\b(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|Jul(?:y)?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\b",
    ),
    ("MONTHNUM", r"(?:0?[1-9]|1[0-2])"),
    ("MONTHDAY", r"(?:(?:0[1-9])|(?:[12][0-9])|(?:3[01])|[1-9])"),
    ("YEAR", r"(?:\d\d){1,2}"),
    ("HOUR", r"(?:2[0123]|[01]?[0-9])"),
    ("MINUTE", r"(?:[0-5][0-9])"),
    ("SECOND", r"(?:(?:[0-5]?[0-9]|60)(?:[:.,][0-9]+)?)"),
    ("TIME", r"%{HOUR}:%{MINUTE}(?::%{SECOND})?"),
    ("ISO8601_TIMEZONE", r"(?:Z|[+-]%{HOUR}(?::?%{MINUTE}))"),
    (
        "TIMESTAMP_ISO8601",
        r"%{YEAR}-%{MONTHNUM}-%{MONTHDAY}[T ]%{HOUR}:?%{MINUTE}(?::?%{SECOND})?%{ISO8601_TIMEZONE}?",
    ),
    ("SYSLOGTIMESTAMP", r"%{MONTH} +%{MONTHDAY} %{TIME}"),
    ("PROG", r"[\x21-\x5a\x5c\x5e-\x7e]+"),
    ("SYSLOGPROG", r"%{PROG:program}(?:\[%{POSINT:pid}\])?"),
    ("SYSLOGHOST", r"%{IPORHOST}"),
    (
        "LOGLEVEL",
        r"(?:[Aa]lert|ALERT|[Tt]race|TRACE|[Dd]ebug|DEBUG|[Nn]otice|NOTICE|[Ii]nfo|INFO|[Ww]arn?(?:ing)?|WARN?(?:ING)?|[Ee]rr?(?:or)?|ERR?(?:OR)?|[Cc]rit?(?:ical)?|CRIT?(?:ICAL)?|[Ff]atal|FATAL|[Ss]evere|SEVERE|EMERG(?:ENCY)?|[Ee]merg(?:ency)?)",
    ),
    ("EMAILADDRESS", r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)+"),
];

/// Named regex fragments available to `%{NAME}` references.
#[derive(Debug, Clone)]
pub struct GrokDefinitions {
    defs: HashMap<String, String>,
}

impl Default for GrokDefinitions {
    fn default() -> Self {
        Self {
            defs: BUILTIN_DEFINITIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl GrokDefinitions {
    /// Add `NAME regex` lines. Blank lines and `#` comments are ignored;
    /// later definitions replace earlier ones (including built-ins).
    pub fn extend_from_text(&mut self, text: &str) -> Result<(), String> {
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, body) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("line {}: expected 'NAME regex'", lineno + 1))?;
            self.defs.insert(name.to_string(), body.trim().to_string());
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.defs.insert(name.into(), body.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Text,
    Int,
    Float,
}

#[derive(Debug, Clone)]
struct Capture {
    group: String,
    field: String,
    conversion: Conversion,
}

/// A compiled grok expression.
#[derive(Debug, Clone)]
pub struct GrokPattern {
    regex: Regex,
    captures: Vec<Capture>,
}

impl GrokPattern {
    pub fn compile(pattern: &str, defs: &GrokDefinitions) -> Result<Self, String> {
        let mut captures = Vec::new();
        let expanded = expand(pattern, defs, &mut captures, 0)?;
        let regex = Regex::new(&expanded).map_err(|e| format!("invalid grok pattern: {}", e))?;
        Ok(Self { regex, captures })
    }

    /// Match `text`; `None` when the pattern does not match.
    pub fn extract(&self, text: &str) -> Option<FieldMap> {
        let caps = self.regex.captures(text)?;
        let mut fields = FieldMap::new();
        for capture in &self.captures {
            let Some(m) = caps.name(&capture.group) else {
                continue;
            };
            let raw = m.as_str();
            let value = match capture.conversion {
                Conversion::Text => FieldValue::from(raw),
                Conversion::Int => raw
                    .parse::<i64>()
                    .map(FieldValue::from)
                    .unwrap_or_else(|_| FieldValue::from(raw)),
                Conversion::Float => raw
                    .parse::<f64>()
                    .map(FieldValue::from)
                    .unwrap_or_else(|_| FieldValue::from(raw)),
            };
            fields.insert(capture.field.clone(), value);
        }
        Some(fields)
    }
}

fn expand(
    pattern: &str,
    defs: &GrokDefinitions,
    captures: &mut Vec<Capture>,
    depth: usize,
) -> Result<String, String> {
    if depth > MAX_DEPTH {
        return Err("grok definitions nest too deeply (recursive reference?)".to_string());
    }

    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unterminated reference in '{}'", pattern))?;
        let reference = &after[..end];
        rest = &after[end + 1..];

        let mut parts = reference.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let field = parts.next().filter(|f| !f.is_empty());
        let conversion = match parts.next() {
            None => Conversion::Text,
            Some("int") => Conversion::Int,
            Some("float") => Conversion::Float,
            Some(other) => return Err(format!("unknown conversion '{}' in %{{{}}}", other, reference)),
        };

        let body = defs
            .defs
            .get(name)
            .ok_or_else(|| format!("unknown grok pattern '{}'", name))?;
        let inner = expand(body, defs, captures, depth + 1)?;

        match field {
            Some(field) => {
                let group = format!("g{}", captures.len());
                out.push_str(&format!("(?P<{}>{})", group, inner));
                captures.push(Capture {
                    group,
                    field: field.to_string(),
                    conversion,
                });
            }
            None => out.push_str(&format!("(?:{})", inner)),
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(pattern: &str) -> GrokPattern {
        GrokPattern::compile(pattern, &GrokDefinitions::default()).unwrap()
    }

    #[test]
    fn syslog_line() {
        let grok = compile(
            r"%{SYSLOGTIMESTAMP:timestamp} %{SYSLOGHOST:host} %{SYSLOGPROG}: %{GREEDYDATA:message}",
        );
        let fields = grok
            .extract("Oct 11 22:14:15 mymachine su[812]: 'su root' failed for lonvick")
            .unwrap();
        assert_eq!(fields["timestamp"], FieldValue::from("Oct 11 22:14:15"));
        assert_eq!(fields["host"], FieldValue::from("mymachine"));
        assert_eq!(fields["program"], FieldValue::from("su"));
        assert_eq!(fields["pid"], FieldValue::from("812"));
        assert_eq!(fields["message"], FieldValue::from("'su root' failed for lonvick"));
    }

    #[test]
    fn conversions() {
        let grok = compile(r"%{IP:client} %{INT:status:int} %{NUMBER:took:float}");
        let fields = grok.extract("10.1.2.3 404 0.25").unwrap();
        assert_eq!(fields["client"], FieldValue::from("10.1.2.3"));
        assert_eq!(fields["status"], FieldValue::Number(404.0));
        assert_eq!(fields["took"], FieldValue::Number(0.25));
    }

    #[test]
    fn optional_groups_that_do_not_participate_are_omitted() {
        let grok = compile(r"^%{SYSLOGPROG}$");
        let fields = grok.extract("cron").unwrap();
        assert!(fields.contains_key("program"));
        assert!(!fields.contains_key("pid"));
    }

    #[test]
    fn custom_definitions_override_and_extend() {
        let mut defs = GrokDefinitions::default();
        defs.extend_from_text("# site patterns\nTICKET [A-Z]+-[0-9]+\n\n").unwrap();
        let grok = GrokPattern::compile(r"ref %{TICKET:ticket}", &defs).unwrap();
        assert_eq!(grok.extract("see ref OPS-42").unwrap()["ticket"], FieldValue::from("OPS-42"));

        assert!(defs.extend_from_text("NOBODY").is_err());
    }

    #[test]
    fn compile_errors() {
        let defs = GrokDefinitions::default();
        assert!(GrokPattern::compile("%{NOPE:x}", &defs).is_err());
        assert!(GrokPattern::compile("%{WORD:x", &defs).is_err());
        assert!(GrokPattern::compile("%{WORD:x:bool}", &defs).is_err());
        assert!(GrokPattern::compile("(unclosed %{WORD:x}", &defs).is_err());

        let mut looped = GrokDefinitions::default();
        looped.insert("A", "%{B}");
        looped.insert("B", "%{A}");
        assert!(GrokPattern::compile("%{A}", &looped).is_err());
    }

    #[test]
    fn non_match_is_none() {
        assert!(compile(r"^%{INT:n}$").extract("abc").is_none());
    }
}
