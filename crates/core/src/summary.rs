//! Periodic report records produced by aggregation windows.
//!
//! Every summary knows how to project itself onto a fixed-order numeric
//! vector for the anomaly scorer. The order of fields in each
//! `anomaly_vector` is part of the persisted-history contract: changing it
//! invalidates stored baselines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::SourceType;

/// One ranked entry of a top-N list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub label: String,
    pub metric: u64,
}

impl TopEntry {
    pub fn new(label: impl Into<String>, metric: u64) -> Self {
        Self {
            label: label.into(),
            metric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyslogSummary {
    pub time: DateTime<Utc>,
    pub normal: u64,
    pub warn: u64,
    pub error: u64,
    pub patterns: u64,
    pub err_patterns: u64,
    pub top_list: Vec<TopEntry>,
    pub top_error_list: Vec<TopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapSummary {
    pub time: DateTime<Utc>,
    pub count: u64,
    pub types: u64,
    pub top_list: Vec<TopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetflowSummary {
    pub time: DateTime<Utc>,
    pub packets: u64,
    pub bytes: u64,
    pub macs: u64,
    pub ips: u64,
    pub flows: u64,
    pub protocols: u64,
    pub fumbles: u64,
    pub top_mac_packets: Vec<TopEntry>,
    pub top_mac_bytes: Vec<TopEntry>,
    pub top_ip_packets: Vec<TopEntry>,
    pub top_ip_bytes: Vec<TopEntry>,
    pub top_flow_packets: Vec<TopEntry>,
    pub top_flow_bytes: Vec<TopEntry>,
    pub top_protocol_packets: Vec<TopEntry>,
    pub top_protocol_bytes: Vec<TopEntry>,
    pub top_fumble_src: Vec<TopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowsSummary {
    pub time: DateTime<Utc>,
    pub normal: u64,
    pub warn: u64,
    pub error: u64,
    pub types: u64,
    pub error_types: u64,
    pub top_list: Vec<TopEntry>,
    pub top_error_list: Vec<TopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtelSummary {
    pub time: DateTime<Utc>,
    pub normal: u64,
    pub warn: u64,
    pub error: u64,
    pub types: u64,
    pub error_types: u64,
    pub hosts: u64,
    pub trace_ids: u64,
    pub top_list: Vec<TopEntry>,
    pub top_error_list: Vec<TopEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSummary {
    pub time: DateTime<Utc>,
    pub count: u64,
    pub types: u64,
    pub clients: u64,
    pub topics: u64,
    pub top_list: Vec<TopEntry>,
}

/// Host resource usage averaged over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub time: DateTime<Utc>,
    pub cpu: f64,
    pub memory: f64,
    pub load: f64,
    pub disk: f64,
    pub net: f64,
    pub samples: u64,
}

/// A flushed window for any source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Summary {
    Syslog(SyslogSummary),
    Trap(TrapSummary),
    Netflow(NetflowSummary),
    WindowsEvent(WindowsSummary),
    OtelLog(OtelSummary),
    Mqtt(MqttSummary),
    Monitor(MonitorSummary),
}

impl Summary {
    pub fn source_type(&self) -> SourceType {
        match self {
            Summary::Syslog(_) => SourceType::Syslog,
            Summary::Trap(_) => SourceType::Trap,
            Summary::Netflow(_) => SourceType::Netflow,
            Summary::WindowsEvent(_) => SourceType::WindowsEvent,
            Summary::OtelLog(_) => SourceType::OtelLog,
            Summary::Mqtt(_) => SourceType::Mqtt,
            Summary::Monitor(_) => SourceType::Monitor,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Summary::Syslog(s) => s.time,
            Summary::Trap(s) => s.time,
            Summary::Netflow(s) => s.time,
            Summary::WindowsEvent(s) => s.time,
            Summary::OtelLog(s) => s.time,
            Summary::Mqtt(s) => s.time,
            Summary::Monitor(s) => s.time,
        }
    }

    /// Fixed-order feature vector for anomaly scoring.
    pub fn anomaly_vector(&self) -> Vec<f64> {
        match self {
            Summary::Syslog(s) => vec![
                s.normal as f64,
                s.warn as f64,
                s.error as f64,
                s.patterns as f64,
                s.err_patterns as f64,
            ],
            Summary::Trap(s) => vec![s.count as f64, s.types as f64],
            Summary::Netflow(s) => vec![
                s.packets as f64,
                s.bytes as f64,
                s.macs as f64,
                s.ips as f64,
                s.flows as f64,
                s.protocols as f64,
                s.fumbles as f64,
            ],
            Summary::WindowsEvent(s) => vec![
                s.normal as f64,
                s.warn as f64,
                s.error as f64,
                s.types as f64,
                s.error_types as f64,
            ],
            Summary::OtelLog(s) => vec![
                s.normal as f64,
                s.warn as f64,
                s.error as f64,
                s.types as f64,
                s.error_types as f64,
                s.hosts as f64,
                s.trace_ids as f64,
            ],
            Summary::Mqtt(s) => vec![
                s.count as f64,
                s.types as f64,
                s.clients as f64,
                s.topics as f64,
            ],
            Summary::Monitor(s) => vec![s.cpu, s.memory, s.load, s.disk, s.net],
        }
    }

    /// All top-N lists carried by this summary.
    pub fn top_lists(&self) -> Vec<&[TopEntry]> {
        match self {
            Summary::Syslog(s) => vec![&s.top_list, &s.top_error_list],
            Summary::Trap(s) => vec![&s.top_list],
            Summary::Netflow(s) => vec![
                &s.top_mac_packets,
                &s.top_mac_bytes,
                &s.top_ip_packets,
                &s.top_ip_bytes,
                &s.top_flow_packets,
                &s.top_flow_bytes,
                &s.top_protocol_packets,
                &s.top_protocol_bytes,
                &s.top_fumble_src,
            ],
            Summary::WindowsEvent(s) => vec![&s.top_list, &s.top_error_list],
            Summary::OtelLog(s) => vec![&s.top_list, &s.top_error_list],
            Summary::Mqtt(s) => vec![&s.top_list],
            Summary::Monitor(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syslog_vector_order_is_fixed() {
        let summary = Summary::Syslog(SyslogSummary {
            time: Utc::now(),
            normal: 10,
            warn: 2,
            error: 1,
            patterns: 4,
            err_patterns: 1,
            top_list: vec![TopEntry::new("a", 3)],
            top_error_list: Vec::new(),
        });
        assert_eq!(summary.anomaly_vector(), vec![10.0, 2.0, 1.0, 4.0, 1.0]);
        assert_eq!(summary.source_type(), SourceType::Syslog);
        assert_eq!(summary.top_lists().len(), 2);
    }

    #[test]
    fn summary_serializes_with_type_tag() {
        let summary = Summary::Trap(TrapSummary {
            time: Utc::now(),
            count: 1,
            types: 1,
            top_list: Vec::new(),
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "trap");
        let back: Summary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
