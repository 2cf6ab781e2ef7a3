//! Compiled detection rule.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use logeye_core::Level;

use crate::condition::{parse_condition, Condition};
use crate::matcher::{compile_selection, Selection};
use crate::validation::validate_detection;

use super::document::{LogSource, RuleDocument};

/// Named selections plus the condition that combines them.
#[derive(Debug, Clone)]
pub struct Detection {
    pub selections: BTreeMap<String, Selection>,
    pub condition: Condition,
}

/// A rule ready for evaluation. Immutable once built.
#[derive(Debug, Clone)]
pub struct DetectionRule {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub level: Level,
    pub tags: Vec<String>,
    pub log_source: LogSource,
    pub falsepositives: Vec<String>,
    pub detection: Detection,
}

/// Summary row for listing the active corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub title: String,
    pub level: Level,
    pub tags: Vec<String>,
    pub log_source: LogSource,
}

impl DetectionRule {
    /// Compile a raw document. `fallback_id` is used when the document has
    /// no `id` (normally the file stem).
    pub fn compile(doc: RuleDocument, fallback_id: &str) -> Result<Self, String> {
        let id = doc
            .id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| fallback_id.to_string());
        if id.is_empty() {
            return Err("rule has no id".to_string());
        }

        let level = match doc.level.as_deref() {
            Some(raw) => Level::from_str(raw)?,
            None => Level::Medium,
        };

        let mut condition_source = None;
        let mut selections = BTreeMap::new();
        for (key, value) in &doc.detection {
            let name = key
                .as_str()
                .ok_or_else(|| "detection keys must be strings".to_string())?;
            match name {
                "condition" => condition_source = Some(condition_text(value)?),
                "timeframe" => return Err("'timeframe' correlation is not supported".to_string()),
                _ => {
                    selections.insert(name.to_string(), compile_selection(name, value)?);
                }
            }
        }

        let condition_source =
            condition_source.ok_or_else(|| "detection has no 'condition'".to_string())?;
        let condition = parse_condition(&condition_source)
            .map_err(|e| format!("condition '{}': {}", condition_source, e))?;

        let report = validate_detection(&selections, &condition);
        if !report.valid {
            return Err(report.to_string());
        }

        Ok(Self {
            id,
            title: doc.title,
            description: doc.description,
            status: doc.status,
            level,
            tags: doc.tags,
            log_source: doc.logsource,
            falsepositives: doc.falsepositives,
            detection: Detection {
                selections,
                condition,
            },
        })
    }

    pub fn info(&self) -> RuleInfo {
        RuleInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            level: self.level,
            tags: self.tags.clone(),
            log_source: self.log_source.clone(),
        }
    }
}

/// A condition may be a single expression or a list of alternatives.
fn condition_text(value: &serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Sequence(items) => {
            let parts = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|s| format!("({})", s))
                        .ok_or_else(|| "condition list entries must be strings".to_string())
                })
                .collect::<Result<Vec<_>, _>>()?;
            if parts.is_empty() {
                return Err("condition list is empty".to_string());
            }
            Ok(parts.join(" or "))
        }
        _ => Err("condition must be a string or a list of strings".to_string()),
    }
}
