//! Rule validation with structured errors and suggestions.
//!
//! Checks that a rule's condition and selections agree (unknown names get a
//! "did you mean" hint) and that a corpus has no duplicate ids.
//! Errors block loading; warnings are advisory.

pub mod fuzzy;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, SelectionSet};
use crate::matcher::Selection;
use crate::schema::DetectionRule;

use fuzzy::fuzzy_match;

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location, e.g. `"detection.condition"`.
    pub path: String,
    pub message: String,
    /// Optional "Did you mean …?" suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A non-blocking advisory warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.path, err.message)?;
            if let Some(s) = &err.suggestion {
                write!(f, " (did you mean '{}'?)", s)?;
            }
        }
        Ok(())
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Check a compiled detection block: every name the condition uses must
/// exist, every prefix must match something, selections must not be empty.
pub fn validate_detection(
    selections: &BTreeMap<String, Selection>,
    condition: &Condition,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let names: Vec<&str> = selections.keys().map(String::as_str).collect();

    if names.is_empty() {
        result.error("detection", "no selections defined");
        return result;
    }

    for (name, selection) in selections {
        let empty = match selection {
            Selection::Maps(maps) => maps.iter().any(|m| m.is_empty()),
            Selection::Keywords(words) => words.is_empty(),
        };
        if empty {
            result.error(format!("detection.{}", name), "selection has no fields");
        }
    }

    for referenced in condition.referenced_names() {
        if selections.contains_key(referenced) {
            continue;
        }
        let message = format!("unknown selection '{}'", referenced);
        match fuzzy_match(referenced, &names) {
            Some(s) => result.error_with_suggestion("detection.condition", message, s),
            None => result.error("detection.condition", message),
        }
    }

    let mut sets = Vec::new();
    collect_sets(condition, &mut sets);
    for set in &sets {
        if let SelectionSet::Prefix(prefix) = set {
            if !names.iter().any(|n| n.starts_with(prefix.as_str())) {
                result.error(
                    "detection.condition",
                    format!("'{}*' matches no selection", prefix),
                );
            }
        }
    }

    let referenced = condition.referenced_names();
    for name in &names {
        let used = referenced.contains(name) || sets.iter().any(|s| s.contains(name));
        if !used {
            result.warn(
                format!("detection.{}", name),
                "selection is not used by the condition",
            );
        }
    }

    result
}

/// Check a whole corpus: ids must be unique.
pub fn validate_corpus(rules: &[DetectionRule]) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (i, rule) in rules.iter().enumerate() {
        if let Some(first) = seen.insert(rule.id.as_str(), i) {
            result.error(
                format!("rules[{}].id", i),
                format!("duplicate rule id '{}' (first defined at rules[{}])", rule.id, first),
            );
        }
    }
    result
}

fn collect_sets<'a>(condition: &'a Condition, out: &mut Vec<&'a SelectionSet>) {
    match condition {
        Condition::Selection(_) => {}
        Condition::Not(inner) => collect_sets(inner, out),
        Condition::And(items) | Condition::Or(items) => {
            for item in items {
                collect_sets(item, out);
            }
        }
        Condition::OneOf(set) | Condition::AllOf(set) => out.push(set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parse_condition;
    use crate::matcher::compile_selection;

    fn selections(names: &[&str]) -> BTreeMap<String, Selection> {
        let body: serde_yaml::Value = serde_yaml::from_str("field: value").unwrap();
        names
            .iter()
            .map(|n| (n.to_string(), compile_selection(n, &body).unwrap()))
            .collect()
    }

    #[test]
    fn unknown_selection_gets_suggestion() {
        let sels = selections(&["selection", "filter"]);
        let result = validate_detection(&sels, &parse_condition("selecton and not filter").unwrap());
        assert!(!result.valid);
        assert_eq!(result.errors[0].suggestion.as_deref(), Some("selection"));
        assert!(result.to_string().contains("did you mean 'selection'"));
    }

    #[test]
    fn prefix_must_match_something() {
        let sels = selections(&["selection"]);
        let result = validate_detection(&sels, &parse_condition("1 of filter_*").unwrap());
        assert!(!result.valid);
    }

    #[test]
    fn unused_selection_is_only_a_warning() {
        let sels = selections(&["selection", "spare"]);
        let result = validate_detection(&sels, &parse_condition("selection").unwrap());
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);

        let result = validate_detection(&sels, &parse_condition("1 of them").unwrap());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let body: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        let mut sels = BTreeMap::new();
        sels.insert("selection".to_string(), compile_selection("selection", &body).unwrap());
        let result = validate_detection(&sels, &parse_condition("selection").unwrap());
        assert!(!result.valid);
    }
}
