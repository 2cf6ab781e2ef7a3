//! Rule documents and their compiled form.
//!
//! - `RuleDocument`: the YAML shape (title, id, level, tags, logsource, detection)
//! - `DetectionRule`: compiled selections and condition, ready for evaluation
//! - `RuleInfo`: listing row for the control surface

mod document;
mod rule;

pub use document::*;
pub use rule::*;

#[cfg(test)]
mod tests;
