//! Turn a record body into a [`FieldMap`].
//!
//! With a grok expression configured the body must match it; otherwise the
//! body must be a JSON object. Anything else is a parse error, which the
//! detection worker treats as a routine skip.

mod grok;

use std::fs;

use tracing::warn;

use logeye_core::config::RulesConfig;
use logeye_core::{FieldMap, FieldValue, RecordError};

pub use grok::{GrokDefinitions, GrokPattern};

#[derive(Debug, Clone)]
enum Mode {
    Json,
    Grok(Box<GrokPattern>),
    /// A grok expression was configured but does not compile.
    Broken(String),
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    mode: Mode,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::json()
    }
}

impl Normalizer {
    pub fn json() -> Self {
        Self { mode: Mode::Json }
    }

    /// Grok-based normalizer. A malformed expression does not fail here:
    /// every later `extract` reports it as a parse error instead.
    pub fn grok(pattern: &str, defs: &GrokDefinitions) -> Self {
        let mode = match GrokPattern::compile(pattern, defs) {
            Ok(compiled) => Mode::Grok(Box::new(compiled)),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "grok pattern does not compile, every record will fail to parse");
                Mode::Broken(e)
            }
        };
        Self { mode }
    }

    pub fn from_config(config: &RulesConfig) -> Self {
        let Some(pattern) = &config.grok_pattern else {
            return Self::json();
        };

        let mut defs = GrokDefinitions::default();
        if let Some(path) = &config.grok_definitions {
            let loaded = fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|text| defs.extend_from_text(&text));
            if let Err(e) = loaded {
                let message = format!("grok definitions {}: {}", path.display(), e);
                warn!(error = %message, "failed to load grok definitions");
                return Self {
                    mode: Mode::Broken(message),
                };
            }
        }
        Self::grok(pattern, &defs)
    }

    pub fn is_grok(&self) -> bool {
        !matches!(self.mode, Mode::Json)
    }

    pub fn extract(&self, body: &str) -> Result<FieldMap, RecordError> {
        match &self.mode {
            Mode::Json => extract_json(body),
            Mode::Grok(pattern) => pattern
                .extract(body)
                .ok_or_else(|| RecordError::Parse("body does not match grok pattern".to_string())),
            Mode::Broken(e) => Err(RecordError::Parse(e.clone())),
        }
    }
}

fn extract_json(body: &str) -> Result<FieldMap, RecordError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| RecordError::Parse(format!("invalid JSON: {}", e)))?;
    match FieldValue::from(value) {
        FieldValue::Map(map) => Ok(map),
        other => Err(RecordError::Parse(format!(
            "expected a JSON object, got {}",
            other.type_name()
        ))),
    }
}
