use chrono::{DateTime, Utc};

use logeye_core::{RecordDetail, SourceType, Summary, SyslogSummary};

use super::{Accumulator, SeverityClass};
use crate::pattern::normalize;
use crate::topn::FrequencyTable;

/// Severities 0..=3 (emergency..error) are errors, 4 is a warning.
pub fn classify(severity: u8) -> SeverityClass {
    match severity {
        0..=3 => SeverityClass::Error,
        4 => SeverityClass::Warn,
        _ => SeverityClass::Normal,
    }
}

#[derive(Debug, Default)]
pub struct SyslogAccumulator {
    normal: u64,
    warn: u64,
    error: u64,
    patterns: FrequencyTable,
    error_patterns: FrequencyTable,
}

impl Accumulator for SyslogAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::Syslog
    }

    fn update(&mut self, detail: &RecordDetail) {
        let RecordDetail::Syslog {
            severity,
            host,
            tag,
            message,
        } = detail
        else {
            return;
        };

        let pattern = normalize(&format!("{} {} {}", host, tag, message));
        let class = classify(*severity);
        match class {
            SeverityClass::Error => self.error += 1,
            SeverityClass::Warn => self.warn += 1,
            SeverityClass::Normal => self.normal += 1,
        }
        if class == SeverityClass::Error {
            self.error_patterns.increment(pattern.clone());
        }
        self.patterns.increment(pattern);
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = SyslogSummary {
            time,
            normal: self.normal,
            warn: self.warn,
            error: self.error,
            patterns: self.patterns.distinct(),
            err_patterns: self.error_patterns.distinct(),
            top_list: self.patterns.top(top_n),
            top_error_list: self.error_patterns.top(top_n),
        };
        *self = Self::default();
        Summary::Syslog(summary)
    }
}
