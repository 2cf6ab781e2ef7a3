use chrono::{DateTime, Utc};

use logeye_core::{RecordDetail, SourceType, Summary, TrapSummary};

use super::Accumulator;
use crate::topn::FrequencyTable;

#[derive(Debug, Default)]
pub struct TrapAccumulator {
    count: u64,
    types: FrequencyTable,
}

impl Accumulator for TrapAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::Trap
    }

    fn update(&mut self, detail: &RecordDetail) {
        if let RecordDetail::Trap { sender, trap_type } = detail {
            self.count += 1;
            self.types.increment(format!("{} {}", sender, trap_type));
        }
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = TrapSummary {
            time,
            count: self.count,
            types: self.types.distinct(),
            top_list: self.types.top(top_n),
        };
        *self = Self::default();
        Summary::Trap(summary)
    }
}
