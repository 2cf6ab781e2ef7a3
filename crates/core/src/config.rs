use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::record::SourceType;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64_opt(profile: &str, key: &str) -> Option<f64> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub report: ReportConfig,
    pub anomaly: AnomalyConfig,
    pub queue: QueueConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LOGEYE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LOGEYE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            report: ReportConfig::from_env_profiled(p),
            anomaly: AnomalyConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  rules:    dir={}, grok={}, watch={}",
            self.rules.dir.display(),
            self.rules.grok_pattern.is_some(),
            self.rules.watch
        );
        tracing::info!(
            "  report:   top_n={}, interval={:?}, windows_interval={:?}",
            self.report.top_n,
            self.report.interval,
            self.report.windows_interval
        );
        tracing::info!(
            "  anomaly:  threshold={:?}, time_data={}, delay={}h, trees={}",
            self.anomaly.threshold,
            self.anomaly.use_time_data,
            self.anomaly.notify_delay_hours,
            self.anomaly.trees
        );
        tracing::info!("  queue:    capacity={}", self.queue.capacity);
        tracing::info!(
            "  notify:   webhook={}, timeout={}s, min_level={}",
            if self.notify.webhook_url.is_some() { "(set)" } else { "(none)" },
            self.notify.webhook_timeout_secs,
            self.notify.min_level
        );
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub dir: PathBuf,
    /// Grok expression applied to record bodies before rule evaluation.
    /// When unset, bodies are decoded as JSON objects.
    pub grok_pattern: Option<String>,
    /// Optional file of extra `NAME regex` grok definitions.
    pub grok_definitions: Option<PathBuf>,
    /// Optional YAML file mapping rule field names to record field aliases.
    pub field_config: Option<PathBuf>,
    /// Reload the corpus when files under `dir` change.
    pub watch: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/rules"),
            grok_pattern: None,
            grok_definitions: None,
            field_config: None,
            watch: false,
        }
    }
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            grok_pattern: profiled_env_opt(p, "GROK_PATTERN"),
            grok_definitions: profiled_env_opt(p, "GROK_DEFINITIONS").map(PathBuf::from),
            field_config: profiled_env_opt(p, "RULES_FIELD_CONFIG").map(PathBuf::from),
            watch: profiled_env_bool(p, "RULES_WATCH", false),
        }
    }
}

// ── Report windows ────────────────────────────────────────────

/// Boundary at which an aggregation window flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportInterval {
    Minute,
    Hour,
}

impl ReportInterval {
    fn parse_or(value: Option<String>, default: ReportInterval) -> ReportInterval {
        match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("minute") | Some("min") | Some("m") => ReportInterval::Minute,
            Some("hour") | Some("h") => ReportInterval::Hour,
            _ => default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub top_n: usize,
    pub interval: ReportInterval,
    /// Windows event log volume is low enough that hourly windows are the default.
    pub windows_interval: ReportInterval,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            interval: ReportInterval::Minute,
            windows_interval: ReportInterval::Hour,
        }
    }
}

impl ReportConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            top_n: profiled_env_usize(p, "REPORT_TOP_N", 10).max(1),
            interval: ReportInterval::parse_or(
                profiled_env_opt(p, "REPORT_INTERVAL"),
                ReportInterval::Minute,
            ),
            windows_interval: ReportInterval::parse_or(
                profiled_env_opt(p, "WINDOWS_REPORT_INTERVAL"),
                ReportInterval::Hour,
            ),
        }
    }

    /// Flush boundary for a given source type.
    pub fn interval_for(&self, source: SourceType) -> ReportInterval {
        match source {
            SourceType::WindowsEvent => self.windows_interval,
            _ => self.interval,
        }
    }
}

// ── Anomaly scoring ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Calibrated score above which the latest point raises an alert.
    /// `None` disables alerting (scores are still computed and saved).
    pub threshold: Option<f64>,
    /// Add weekend/hour-of-day features once history spans a week.
    pub use_time_data: bool,
    /// Warm-up: history must span more than this many hours before alerting.
    pub notify_delay_hours: u32,
    pub trees: usize,
    pub sample_size: usize,
    pub min_points: usize,
    pub min_alert_points: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            use_time_data: false,
            notify_delay_hours: 24,
            trees: 1000,
            sample_size: 256,
            min_points: 10,
            min_alert_points: 24,
        }
    }
}

impl AnomalyConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            threshold: profiled_env_f64_opt(p, "ANOMALY_THRESHOLD").filter(|t| *t > 0.0),
            use_time_data: profiled_env_bool(p, "ANOMALY_USE_TIME_DATA", false),
            notify_delay_hours: profiled_env_usize(
                p,
                "ANOMALY_NOTIFY_DELAY_HOURS",
                defaults.notify_delay_hours as usize,
            ) as u32,
            trees: profiled_env_usize(p, "ANOMALY_TREES", defaults.trees).max(1),
            sample_size: profiled_env_usize(p, "ANOMALY_SAMPLE_SIZE", defaults.sample_size).max(2),
            min_points: profiled_env_usize(p, "ANOMALY_MIN_POINTS", defaults.min_points),
            min_alert_points: profiled_env_usize(
                p,
                "ANOMALY_MIN_ALERT_POINTS",
                defaults.min_alert_points,
            ),
        }
    }
}

// ── Queues ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 20_000 }
    }
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            capacity: profiled_env_usize(p, "QUEUE_CAPACITY", 20_000).max(1),
        }
    }
}

// ── Notification ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    /// Per-request webhook timeout, in seconds.
    pub webhook_timeout_secs: u64,
    /// Events below this level are recorded but not dispatched.
    pub min_level: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 10,
            min_level: "low".to_string(),
        }
    }
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            webhook_url: profiled_env_opt(p, "NOTIFY_WEBHOOK_URL"),
            webhook_timeout_secs: profiled_env_usize(p, "NOTIFY_WEBHOOK_TIMEOUT", 10).max(1) as u64,
            min_level: profiled_env_or(p, "NOTIFY_MIN_LEVEL", "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parsing_falls_back_to_default() {
        assert_eq!(
            ReportInterval::parse_or(Some("HOUR".into()), ReportInterval::Minute),
            ReportInterval::Hour
        );
        assert_eq!(
            ReportInterval::parse_or(Some("fortnight".into()), ReportInterval::Minute),
            ReportInterval::Minute
        );
        assert_eq!(ReportInterval::parse_or(None, ReportInterval::Hour), ReportInterval::Hour);
    }

    #[test]
    fn windows_events_use_their_own_interval() {
        let report = ReportConfig::default();
        assert_eq!(report.interval_for(SourceType::WindowsEvent), ReportInterval::Hour);
        assert_eq!(report.interval_for(SourceType::Syslog), ReportInterval::Minute);
    }

    #[test]
    fn defaults_match_reference_constants() {
        let config = Config::default();
        assert_eq!(config.queue.capacity, 20_000);
        assert_eq!(config.anomaly.trees, 1000);
        assert_eq!(config.anomaly.sample_size, 256);
        assert_eq!(config.anomaly.min_points, 10);
        assert_eq!(config.anomaly.min_alert_points, 24);
        assert!(config.anomaly.threshold.is_none());
        assert_eq!(config.profile_label(), "default");
    }
}
