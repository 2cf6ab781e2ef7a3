//! Error type for rule loading and compilation.

use std::path::PathBuf;

/// Errors that can occur while loading or reloading the rule corpus.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse/deserialization error.
    #[error("YAML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but does not describe a usable rule.
    #[error("invalid rule {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    /// Corpus-level validation error (e.g. duplicate ids).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Field alias config could not be read or parsed.
    #[error("field config error: {0}")]
    FieldConfig(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
