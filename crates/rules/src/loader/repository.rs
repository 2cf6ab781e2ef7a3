//! Where rule sources come from.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::field_config::FieldConfig;

use super::error::{Result, RuleError};

/// Raw bytes of one rule file and where they came from.
#[derive(Debug, Clone)]
pub struct RuleSource {
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

impl RuleSource {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            path: path.into(),
        }
    }

    /// File stem, used as the rule id when the document has none.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Supplies rule sources and the optional field alias config.
pub trait RuleRepository: Send + Sync {
    /// All rule sources in a stable order. Load order is evaluation order.
    fn enumerate(&self) -> Result<Vec<RuleSource>>;

    fn field_config(&self) -> Result<Option<FieldConfig>>;
}

// ── Directory ───────────────────────────────────────────────────────

/// Rules stored as `*.yml` / `*.yaml` files under a directory tree.
///
/// Dotfiles, dot-directories and non-YAML files are skipped. Files are
/// returned sorted by path so load order does not depend on the filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    dir: PathBuf,
    field_config: Option<PathBuf>,
}

impl DirectoryRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            field_config: None,
        }
    }

    pub fn with_field_config(mut self, path: Option<PathBuf>) -> Self {
        self.field_config = path;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan_dir_recursive(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|source| RuleError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| RuleError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, out)?;
                continue;
            }

            if is_yaml(&path) {
                out.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-YAML file");
            }
        }
        Ok(())
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

impl RuleRepository for DirectoryRepository {
    fn enumerate(&self) -> Result<Vec<RuleSource>> {
        let mut paths = Vec::new();
        self.scan_dir_recursive(&self.dir, &mut paths)?;
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let bytes = fs::read(&path).map_err(|source| RuleError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(RuleSource { bytes, path })
            })
            .collect()
    }

    fn field_config(&self) -> Result<Option<FieldConfig>> {
        let Some(path) = &self.field_config else {
            return Ok(None);
        };
        let text = fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.clone(),
            source,
        })?;
        FieldConfig::from_yaml(&text)
            .map(Some)
            .map_err(|e| RuleError::FieldConfig(format!("{}: {}", path.display(), e)))
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// Fixed set of sources, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    pub sources: Vec<RuleSource>,
    pub field_config: Option<FieldConfig>,
}

impl MemoryRepository {
    pub fn new(sources: Vec<RuleSource>) -> Self {
        Self {
            sources,
            field_config: None,
        }
    }
}

impl RuleRepository for MemoryRepository {
    fn enumerate(&self) -> Result<Vec<RuleSource>> {
        Ok(self.sources.clone())
    }

    fn field_config(&self) -> Result<Option<FieldConfig>> {
        Ok(self.field_config.clone())
    }
}
