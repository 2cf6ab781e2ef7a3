//! Rule loading: repositories, corpus construction and hot-reload.
//!
//! Loading is all-or-nothing. Any unreadable, unparsable or invalid source
//! fails the whole load, so a corpus is either complete or absent.

mod error;
mod repository;
mod watcher;


use tracing::info;

use crate::evaluator::RuleCorpus;
use crate::schema::{DetectionRule, RuleDocument};
use crate::validation::validate_corpus;

pub use self::error::{Result, RuleError};
pub use self::repository::{DirectoryRepository, MemoryRepository, RuleRepository, RuleSource};
pub use self::watcher::watch_rules;

/// Build a corpus from every source the repository enumerates.
pub fn load_corpus(repo: &dyn RuleRepository) -> Result<RuleCorpus> {
    let sources = repo.enumerate()?;
    let field_config = repo.field_config()?.unwrap_or_default();

    let mut rules = Vec::with_capacity(sources.len());
    for source in &sources {
        let rule = compile_source(source)?;
        info!(rule_id = %rule.id, level = %rule.level, path = %source.path.display(), "loaded rule");
        rules.push(rule);
    }

    let report = validate_corpus(&rules);
    if !report.valid {
        return Err(RuleError::Validation(report.to_string()));
    }

    info!(count = rules.len(), "rule corpus loaded");
    Ok(RuleCorpus::new(rules, field_config))
}

/// Parse and compile one source.
pub fn compile_source(source: &RuleSource) -> Result<DetectionRule> {
    let text = std::str::from_utf8(&source.bytes).map_err(|e| RuleError::Invalid {
        path: source.path.clone(),
        message: format!("not valid UTF-8: {}", e),
    })?;
    let doc = RuleDocument::from_yaml(text).map_err(|e| RuleError::Parse {
        path: source.path.clone(),
        source: e,
    })?;
    DetectionRule::compile(doc, &source.stem()).map_err(|message| RuleError::Invalid {
        path: source.path.clone(),
        message,
    })
}

/// Parse a standalone rule text (no backing file). The text must carry an `id`.
pub fn parse_rule(text: &str) -> Result<DetectionRule> {
    let path = std::path::PathBuf::from("<inline>");
    let doc = RuleDocument::from_yaml(text).map_err(|e| RuleError::Parse {
        path: path.clone(),
        source: e,
    })?;
    DetectionRule::compile(doc, "").map_err(|message| RuleError::Invalid { path, message })
}
