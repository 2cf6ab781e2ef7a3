use std::collections::HashSet;

use chrono::{DateTime, Utc};

use logeye_core::{MqttSummary, RecordDetail, SourceType, Summary};

use super::Accumulator;
use crate::topn::FrequencyTable;

/// Messages are typed by `(client, topic)` pair.
#[derive(Debug, Default)]
pub struct MqttAccumulator {
    count: u64,
    types: FrequencyTable,
    clients: HashSet<String>,
    topics: HashSet<String>,
}

impl Accumulator for MqttAccumulator {
    fn source_type(&self) -> SourceType {
        SourceType::Mqtt
    }

    fn update(&mut self, detail: &RecordDetail) {
        if let RecordDetail::Mqtt { client_id, topic } = detail {
            self.count += 1;
            self.types.increment(format!("{} {}", client_id, topic));
            self.clients.insert(client_id.clone());
            self.topics.insert(topic.clone());
        }
    }

    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary {
        let summary = MqttSummary {
            time,
            count: self.count,
            types: self.types.distinct(),
            clients: self.clients.len() as u64,
            topics: self.topics.len() as u64,
            top_list: self.types.top(top_n),
        };
        *self = Self::default();
        Summary::Mqtt(summary)
    }
}
