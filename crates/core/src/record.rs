use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Origin of a log record. Each source type has its own queue and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Syslog,
    Trap,
    Netflow,
    WindowsEvent,
    OtelLog,
    Mqtt,
    Monitor,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::Syslog,
        SourceType::Trap,
        SourceType::Netflow,
        SourceType::WindowsEvent,
        SourceType::OtelLog,
        SourceType::Mqtt,
        SourceType::Monitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Syslog => "syslog",
            SourceType::Trap => "trap",
            SourceType::Netflow => "netflow",
            SourceType::WindowsEvent => "winevent",
            SourceType::OtelLog => "otel",
            SourceType::Mqtt => "mqtt",
            SourceType::Monitor => "monitor",
        }
    }

    /// Whether records of this type go through rule detection.
    /// Host-monitor samples are numeric only and feed aggregation alone.
    pub fn is_detectable(&self) -> bool {
        !matches!(self, SourceType::Monitor)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "syslog" => Ok(SourceType::Syslog),
            "trap" => Ok(SourceType::Trap),
            "netflow" | "ipfix" => Ok(SourceType::Netflow),
            "winevent" | "windows_event" => Ok(SourceType::WindowsEvent),
            "otel" | "otel_log" => Ok(SourceType::OtelLog),
            "mqtt" => Ok(SourceType::Mqtt),
            "monitor" => Ok(SourceType::Monitor),
            other => Err(RecordError::UnknownSourceType(other.to_string())),
        }
    }
}

/// A normalized log record as produced by an ingestion collaborator.
///
/// `body` is the raw text handed to the rule normalizer. `detail` carries the
/// typed projection the aggregation window for `source_type` consumes; records
/// without one are still evaluated against rules but not aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub source_type: SourceType,
    pub source: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<RecordDetail>,
}

impl LogRecord {
    pub fn new(
        time: DateTime<Utc>,
        source_type: SourceType,
        source: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            time,
            source_type,
            source: source.into(),
            body: body.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: RecordDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// TCP flag bits as carried in NetFlow/IPFIX `tcpControlBits`.
pub mod tcp_flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ALL: u8 = FIN | SYN | RST | PSH | ACK | URG;
}

/// Type-specific projection of a record used by aggregation windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordDetail {
    Syslog {
        /// RFC 5424 severity, 0 (emergency) .. 7 (debug).
        severity: u8,
        host: String,
        tag: String,
        message: String,
    },
    Trap {
        sender: String,
        trap_type: String,
    },
    Netflow(FlowRecord),
    WindowsEvent {
        /// 1 critical, 2 error, 3 warning, 4 information, 0 log-always.
        level: u8,
        computer: String,
        provider: String,
        event_id: u32,
        #[serde(default)]
        message: String,
    },
    OtelLog {
        /// OTLP severity number, 1..=24.
        severity_number: u8,
        host: String,
        service: String,
        message: String,
        #[serde(default)]
        trace_id: Option<String>,
    },
    Mqtt {
        client_id: String,
        topic: String,
    },
    Monitor {
        cpu: f64,
        memory: f64,
        load: f64,
        disk: f64,
        net_bytes: f64,
    },
}

impl RecordDetail {
    pub fn source_type(&self) -> SourceType {
        match self {
            RecordDetail::Syslog { .. } => SourceType::Syslog,
            RecordDetail::Trap { .. } => SourceType::Trap,
            RecordDetail::Netflow(_) => SourceType::Netflow,
            RecordDetail::WindowsEvent { .. } => SourceType::WindowsEvent,
            RecordDetail::OtelLog { .. } => SourceType::OtelLog,
            RecordDetail::Mqtt { .. } => SourceType::Mqtt,
            RecordDetail::Monitor { .. } => SourceType::Monitor,
        }
    }
}

/// One NetFlow v5/v9 or IPFIX flow record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub src: IpAddr,
    pub dst: IpAddr,
    #[serde(default)]
    pub src_port: u16,
    /// For ICMP this carries `type << 8 | code`.
    #[serde(default)]
    pub dst_port: u16,
    pub protocol: u8,
    #[serde(default)]
    pub tcp_flags: u8,
    pub packets: u64,
    pub bytes: u64,
    #[serde(default)]
    pub src_mac: Option<String>,
    #[serde(default)]
    pub dst_mac: Option<String>,
}

impl FlowRecord {
    pub fn icmp_type(&self) -> Option<u8> {
        if self.protocol == 1 || self.protocol == 58 {
            Some((self.dst_port >> 8) as u8)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips_through_str() {
        for source in SourceType::ALL {
            assert_eq!(source.as_str().parse::<SourceType>().unwrap(), source);
        }
        assert!("snmp".parse::<SourceType>().is_err());
    }

    #[test]
    fn detail_reports_its_source_type() {
        let detail = RecordDetail::Trap {
            sender: "10.0.0.1".into(),
            trap_type: "linkDown".into(),
        };
        assert_eq!(detail.source_type(), SourceType::Trap);
        assert!(!SourceType::Monitor.is_detectable());
    }

    #[test]
    fn log_record_deserializes_without_detail() {
        let json = r#"{"time":"2024-05-01T10:00:00Z","source_type":"syslog","source":"10.1.1.1","body":"{}"}"#;
        let record: LogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_type, SourceType::Syslog);
        assert!(record.detail.is_none());
    }

    #[test]
    fn icmp_type_is_high_byte_of_dst_port() {
        let flow = FlowRecord {
            src: "10.0.0.1".parse().unwrap(),
            dst: "10.0.0.2".parse().unwrap(),
            src_port: 0,
            dst_port: 3 << 8 | 1,
            protocol: 1,
            tcp_flags: 0,
            packets: 1,
            bytes: 64,
            src_mac: None,
            dst_mac: None,
        };
        assert_eq!(flow.icmp_type(), Some(3));
    }
}
