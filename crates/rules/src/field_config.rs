//! Field alias configuration.
//!
//! Rules are written against canonical field names (`EventID`, `Image`, ...)
//! while records may carry the same data under other names. A field config
//! maps each rule-side name to the record-side names to try, in order:
//!
//! ```yaml
//! title: windows-json
//! fieldmappings:
//!   EventID: [EventID, Event.System.EventID]
//!   User: winlog.user.name
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use logeye_core::value::lookup;
use logeye_core::{FieldMap, FieldValue};

/// One alias or a list of aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldAliases {
    One(String),
    Many(Vec<String>),
}

impl FieldAliases {
    fn as_slice(&self) -> Vec<&str> {
        match self {
            FieldAliases::One(s) => vec![s.as_str()],
            FieldAliases::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fieldmappings: BTreeMap<String, FieldAliases>,
}

impl FieldConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Resolve a rule field against a record. Aliases are tried in declared
    /// order; without a mapping the rule field name is looked up directly.
    pub fn resolve<'a>(&self, fields: &'a FieldMap, rule_field: &str) -> Option<&'a FieldValue> {
        match self.fieldmappings.get(rule_field) {
            Some(aliases) => aliases
                .as_slice()
                .into_iter()
                .find_map(|alias| lookup(fields, alias)),
            None => lookup(fields, rule_field),
        }
    }
}
