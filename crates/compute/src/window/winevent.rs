use chrono::{DateTime, Utc};

use logeye_core::{RecordDetail, SourceType, Summary, WindowsSummary};

use super::{Accumulator, SeverityClass};
use crate::pattern::normalize;
use crate::topn::FrequencyTable;

/// Event log levels 1 (critical) and 2 (error) are errors, 3 is a warning.
pub fn classify(level: u8) -> SeverityClass {
    match level {
        1 | 2 => SeverityClass::Error,
        3 => SeverityClass::Warn,
        _ => SeverityClass::Normal,
    }
}

#[derive(Debug, Default)]
pub struct WindowsAccumulator {
    normal: u64,
    warn: u64,
    error: u64,
    types: FrequencyTable,
    error_types: FrequencyTable,
}

impl Accumulator for WindowsAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::WindowsEvent
    }

    fn update(&mut self, detail: &RecordDetail) {
        let RecordDetail::WindowsEvent {
            level,
            computer,
            provider,
            event_id,
            message,
        } = detail
        else {
            return;
        };

        let key = normalize(&format!("{} {}/{} {}", computer, provider, event_id, message));
        let class = classify(*level);
        match class {
            SeverityClass::Error => {
                self.error += 1;
                self.error_types.increment(key.clone());
            }
            SeverityClass::Warn => self.warn += 1,
            SeverityClass::Normal => self.normal += 1,
        }
        self.types.increment(key);
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = WindowsSummary {
            time,
            normal: self.normal,
            warn: self.warn,
            error: self.error,
            types: self.types.distinct(),
            error_types: self.error_types.distinct(),
            top_list: self.types.top(top_n),
            top_error_list: self.error_types.top(top_n),
        };
        *self = Self::default();
        Summary::WindowsEvent(summary)
    }
}
