//! Raw rule document as written on disk.

use serde::{Deserialize, Serialize};

/// Where a rule expects its records to come from. Informational only:
/// every rule is evaluated against every detectable record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// A detection rule before its `detection` block is compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub logsource: LogSource,
    pub detection: serde_yaml::Mapping,
    #[serde(default)]
    pub falsepositives: Vec<String>,
}

impl RuleDocument {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
