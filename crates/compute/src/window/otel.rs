use std::collections::HashSet;

use chrono::{DateTime, Utc};

use logeye_core::{OtelSummary, RecordDetail, SourceType, Summary};

use super::{Accumulator, SeverityClass};
use crate::pattern::normalize;
use crate::topn::FrequencyTable;

/// OTLP severity numbers: 17..=24 are ERROR/FATAL, 13..=16 are WARN.
pub fn classify(severity_number: u8) -> SeverityClass {
    match severity_number {
        17.. => SeverityClass::Error,
        13..=16 => SeverityClass::Warn,
        _ => SeverityClass::Normal,
    }
}

#[derive(Debug, Default)]
pub struct OtelAccumulator {
    normal: u64,
    warn: u64,
    error: u64,
    types: FrequencyTable,
    error_types: FrequencyTable,
    hosts: HashSet<String>,
    trace_ids: HashSet<String>,
}

impl Accumulator for OtelAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::OtelLog
    }

    fn update(&mut self, detail: &RecordDetail) {
        let RecordDetail::OtelLog {
            severity_number,
            host,
            service,
            message,
            trace_id,
        } = detail
        else {
            return;
        };

        let key = normalize(&format!("{} {} {}", host, service, message));
        let class = classify(*severity_number);
        match class {
            SeverityClass::Error => {
                self.error += 1;
                self.error_types.increment(key.clone());
            }
            SeverityClass::Warn => self.warn += 1,
            SeverityClass::Normal => self.normal += 1,
        }
        self.types.increment(key);
        self.hosts.insert(host.clone());
        if let Some(id) = trace_id.as_ref().filter(|id| !id.is_empty()) {
            self.trace_ids.insert(id.clone());
        }
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = OtelSummary {
            time,
            normal: self.normal,
            warn: self.warn,
            error: self.error,
            types: self.types.distinct(),
            error_types: self.error_types.distinct(),
            hosts: self.hosts.len() as u64,
            trace_ids: self.trace_ids.len() as u64,
            top_list: self.types.top(top_n),
            top_error_list: self.error_types.top(top_n),
        };
        *self = Self::default();
        Summary::OtelLog(summary)
    }
}
