use chrono::{DateTime, Utc};

use logeye_core::{MonitorSummary, RecordDetail, SourceType, Summary};

use super::Accumulator;

/// Running sums of host samples; the summary carries per-window averages.
#[derive(Debug, Default)]
pub struct MonitorAccumulator {
    samples: u64,
    cpu: f64,
    memory: f64,
    load: f64,
    disk: f64,
    net: f64,
}

impl Accumulator for MonitorAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::Monitor
    }

    fn update(&mut self, detail: &RecordDetail) {
        if let RecordDetail::Monitor {
            cpu,
            memory,
            load,
            disk,
            net_bytes,
        } = detail
        {
            self.samples += 1;
            self.cpu += cpu;
            self.memory += memory;
            self.load += load;
            self.disk += disk;
            self.net += net_bytes;
        }
    }

    fn flush(&mut self, time: DateTime<Utc>, _top_n: usize) -> Summary {
        let n = self.samples.max(1) as f64;
        let summary = MonitorSummary {
            time,
            cpu: self.cpu / n,
            memory: self.memory / n,
            load: self.load / n,
            disk: self.disk / n,
            net: self.net / n,
            samples: self.samples,
        };
        *self = Self::default();
        Summary::Monitor(summary)
    }
}
