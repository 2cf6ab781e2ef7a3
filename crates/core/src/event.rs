use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::SourceType;

/// Detection severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" | "informational" => Ok(Level::Info),
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            "critical" => Ok(Level::Critical),
            other => Err(format!("unknown level: '{}'", other)),
        }
    }
}

/// What produced a [`NotifyEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Rule,
    Anomaly,
}

/// A detection forwarded to the notification path and appended to the store.
///
/// `rule_id` holds the matching rule's id for rule detections and the source
/// type name for anomaly detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyEvent {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub kind: DetectionKind,
    pub source: String,
    pub rule_id: String,
    pub level: Level,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl NotifyEvent {
    /// Detection raised by a rule match on one record.
    pub fn rule(
        time: DateTime<Utc>,
        source: impl Into<String>,
        body: impl Into<String>,
        rule_id: impl Into<String>,
        level: Level,
        title: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            kind: DetectionKind::Rule,
            source: source.into(),
            rule_id: rule_id.into(),
            level,
            title: title.into(),
            tags,
            body: body.into(),
            score: None,
        }
    }

    /// Detection raised by the anomaly scorer for a source type.
    pub fn anomaly(time: DateTime<Utc>, source_type: SourceType, score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            kind: DetectionKind::Anomaly,
            source: "anomaly".to_string(),
            rule_id: source_type.as_str().to_string(),
            level: Level::High,
            title: format!("Anomaly detected in {} report", source_type),
            tags: vec!["anomaly".to_string(), source_type.as_str().to_string()],
            body: format!("type={} score={:.2}", source_type, score),
            score: Some(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Critical > Level::High);
        assert!(Level::Low > Level::Info);
        assert_eq!("Medium".parse::<Level>().unwrap(), Level::Medium);
        assert!("urgent".parse::<Level>().is_err());
    }

    #[test]
    fn anomaly_event_carries_type_and_score() {
        let event = NotifyEvent::anomaly(Utc::now(), SourceType::Netflow, 87.5);
        assert_eq!(event.kind, DetectionKind::Anomaly);
        assert_eq!(event.rule_id, "netflow");
        assert_eq!(event.score, Some(87.5));
        assert!(event.body.contains("87.50"));
    }
}
