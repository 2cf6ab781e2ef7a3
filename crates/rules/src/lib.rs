//! Detection rule engine.
//!
//! This crate provides:
//! - YAML rule documents with named selections and a boolean condition
//! - Field matchers with wildcard and modifier support
//! - Filesystem and in-memory rule repositories, all-or-nothing loading,
//!   and a `notify` watcher for hot-reload
//! - First-match corpus evaluation behind a swappable snapshot
//! - Record body normalization (grok or JSON) into field maps

pub mod condition;
pub mod evaluator;
pub mod field_config;
pub mod loader;
pub mod matcher;
pub mod normalizer;
pub mod schema;
pub mod validation;

pub use evaluator::{MatchResult, RuleCorpus, RuleSet};
pub use field_config::FieldConfig;
pub use loader::{load_corpus, parse_rule, RuleError};
pub use normalizer::Normalizer;
pub use schema::{DetectionRule, RuleInfo};
