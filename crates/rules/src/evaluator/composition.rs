//! Condition tree evaluation over a rule's selections.
//!
//! AND/OR short-circuit left to right, so a selection that would fail to
//! evaluate is never reached when an earlier branch already decides.

use std::collections::BTreeMap;

use logeye_core::FieldMap;

use crate::condition::{Condition, SelectionSet};
use crate::field_config::FieldConfig;
use crate::matcher::{EvalError, Selection};
use crate::schema::Detection;

/// Evaluate a compiled detection block against one record.
pub(crate) fn evaluate_detection(
    detection: &Detection,
    fields: &FieldMap,
    config: &FieldConfig,
) -> Result<bool, EvalError> {
    evaluate_node(&detection.condition, &detection.selections, fields, config)
}

fn evaluate_node(
    condition: &Condition,
    selections: &BTreeMap<String, Selection>,
    fields: &FieldMap,
    config: &FieldConfig,
) -> Result<bool, EvalError> {
    match condition {
        Condition::Selection(name) => selections
            .get(name)
            .ok_or_else(|| EvalError::UnknownSelection(name.clone()))?
            .matches(fields, config),
        Condition::Not(inner) => Ok(!evaluate_node(inner, selections, fields, config)?),
        Condition::And(items) => {
            for item in items {
                if !evaluate_node(item, selections, fields, config)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Or(items) => {
            for item in items {
                if evaluate_node(item, selections, fields, config)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::OneOf(set) => {
            for selection in members(set, selections) {
                if selection.matches(fields, config)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::AllOf(set) => {
            let mut any = false;
            for selection in members(set, selections) {
                any = true;
                if !selection.matches(fields, config)? {
                    return Ok(false);
                }
            }
            Ok(any)
        }
    }
}

fn members<'a>(
    set: &'a SelectionSet,
    selections: &'a BTreeMap<String, Selection>,
) -> impl Iterator<Item = &'a Selection> + 'a {
    selections
        .iter()
        .filter(move |(name, _)| set.contains(name))
        .map(|(_, selection)| selection)
}
