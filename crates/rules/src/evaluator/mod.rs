//! Rule corpus evaluation.
//!
//! A [`RuleCorpus`] is an immutable, ordered list of compiled rules plus the
//! field alias config they were loaded with. [`RuleSet`] holds the current
//! corpus behind an `Arc` so a reload swaps the whole corpus at once while
//! evaluations already holding a snapshot finish on the old one.

mod composition;

use std::sync::{Arc, RwLock};

use tracing::debug;

use logeye_core::FieldMap;

use crate::field_config::FieldConfig;
use crate::schema::{DetectionRule, RuleInfo};

use composition::evaluate_detection;

/// The first rule that matched a record, if any.
pub type MatchResult<'a> = Option<&'a DetectionRule>;

// ── Corpus ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RuleCorpus {
    rules: Vec<DetectionRule>,
    field_config: FieldConfig,
}

impl RuleCorpus {
    pub fn new(rules: Vec<DetectionRule>, field_config: FieldConfig) -> Self {
        Self {
            rules,
            field_config,
        }
    }

    /// Return the first rule (in load order) whose detection holds.
    ///
    /// A rule that fails to evaluate counts as "no match" and the scan
    /// moves on to the next rule.
    pub fn evaluate(&self, fields: &FieldMap) -> MatchResult<'_> {
        for rule in &self.rules {
            match evaluate_detection(&rule.detection, fields, &self.field_config) {
                Ok(true) => return Some(rule),
                Ok(false) => {}
                Err(e) => {
                    debug!(rule_id = %rule.id, error = %e, "rule evaluation failed, skipping");
                }
            }
        }
        None
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    pub fn rule_list(&self) -> Vec<RuleInfo> {
        self.rules.iter().map(DetectionRule::info).collect()
    }

    pub fn field_config(&self) -> &FieldConfig {
        &self.field_config
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ── Shared handle ───────────────────────────────────────────────────

/// Read-mostly handle to the active corpus.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    current: Arc<RwLock<Arc<RuleCorpus>>>,
}

impl RuleSet {
    pub fn new(corpus: RuleCorpus) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(corpus))),
        }
    }

    /// The corpus evaluations should use right now.
    pub fn snapshot(&self) -> Arc<RuleCorpus> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new corpus. Holders of an earlier snapshot keep it.
    pub fn replace(&self, corpus: RuleCorpus) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(corpus);
    }
}
