//! Report-store collaborator interface and an in-memory implementation.
//!
//! The persistent key-value store lives outside this workspace. Everything the
//! pipeline needs from it goes through [`ReportStore`]; [`MemoryStore`] backs
//! tests and the standalone worker binary.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::event::NotifyEvent;
use crate::record::SourceType;
use crate::summary::Summary;

/// One point of a calibrated anomaly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub time: DateTime<Utc>,
    pub raw_score: f64,
    pub calibrated_score: f64,
}

/// Visitor return value: `true` continues iteration, `false` stops it.
pub type Visit<'a, T> = &'a mut dyn FnMut(&T) -> bool;

/// Persistence operations used by the detection and analytics pipeline.
///
/// Range bounds are inclusive on both ends. Visitors see records in
/// ascending time order.
pub trait ReportStore: Send + Sync {
    fn for_each_summary(
        &self,
        source: SourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visit: Visit<'_, Summary>,
    ) -> Result<(), StoreError>;

    fn save_summary(&self, summary: &Summary) -> Result<(), StoreError>;

    fn for_each_anomaly_score(
        &self,
        source: SourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visit: Visit<'_, AnomalyScore>,
    ) -> Result<(), StoreError>;

    /// Save a calibrated series. Points are keyed by time, so re-saving a
    /// recomputed series replaces the earlier values for the same timestamps.
    fn save_anomaly_scores(
        &self,
        source: SourceType,
        scores: &[AnomalyScore],
    ) -> Result<(), StoreError>;

    fn save_notify(&self, event: &NotifyEvent) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    summaries: HashMap<SourceType, BTreeMap<(i64, u64), Summary>>,
    scores: HashMap<SourceType, BTreeMap<i64, AnomalyScore>>,
    notifications: Vec<NotifyEvent>,
    seq: u64,
}

/// Process-local [`ReportStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

/// Nanosecond key, clamped for times outside the representable range
/// (e.g. `DateTime::<Utc>::MIN_UTC` as an open range start).
fn nanos(t: &DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt()
        .unwrap_or(if t.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    pub fn summary_count(&self, source: SourceType) -> usize {
        self.lock()
            .map(|s| s.summaries.get(&source).map_or(0, |m| m.len()))
            .unwrap_or(0)
    }

    pub fn summaries(&self, source: SourceType) -> Vec<Summary> {
        self.lock()
            .map(|s| {
                s.summaries
                    .get(&source)
                    .map(|m| m.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn anomaly_scores(&self, source: SourceType) -> Vec<AnomalyScore> {
        self.lock()
            .map(|s| {
                s.scores
                    .get(&source)
                    .map(|m| m.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<NotifyEvent> {
        self.lock().map(|s| s.notifications.clone()).unwrap_or_default()
    }

    /// Drop stored summaries and scores for one type (external data clearing).
    pub fn clear_report(&self, source: SourceType) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.summaries.remove(&source);
        state.scores.remove(&source);
        Ok(())
    }
}

impl ReportStore for MemoryStore {
    fn for_each_summary(
        &self,
        source: SourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visit: Visit<'_, Summary>,
    ) -> Result<(), StoreError> {
        let state = self.lock()?;
        if let Some(entries) = state.summaries.get(&source) {
            let range = (nanos(&start), 0)..=(nanos(&end), u64::MAX);
            for summary in entries.range(range).map(|(_, s)| s) {
                if !visit(summary) {
                    break;
                }
            }
        }
        Ok(())
    }

    fn save_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.seq += 1;
        let key = (nanos(&summary.time()), state.seq);
        state
            .summaries
            .entry(summary.source_type())
            .or_default()
            .insert(key, summary.clone());
        Ok(())
    }

    fn for_each_anomaly_score(
        &self,
        source: SourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        visit: Visit<'_, AnomalyScore>,
    ) -> Result<(), StoreError> {
        let state = self.lock()?;
        if let Some(entries) = state.scores.get(&source) {
            for score in entries.range(nanos(&start)..=nanos(&end)).map(|(_, s)| s) {
                if !visit(score) {
                    break;
                }
            }
        }
        Ok(())
    }

    fn save_anomaly_scores(
        &self,
        source: SourceType,
        scores: &[AnomalyScore],
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let series = state.scores.entry(source).or_default();
        for score in scores {
            series.insert(nanos(&score.time), score.clone());
        }
        Ok(())
    }

    fn save_notify(&self, event: &NotifyEvent) -> Result<(), StoreError> {
        self.lock()?.notifications.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::TrapSummary;
    use chrono::{Duration, TimeZone};

    fn trap(time: DateTime<Utc>, count: u64) -> Summary {
        Summary::Trap(TrapSummary {
            time,
            count,
            types: 1,
            top_list: Vec::new(),
        })
    }

    #[test]
    fn summaries_are_visited_in_time_range_order() {
        let store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        store.save_summary(&trap(t0 + Duration::minutes(2), 3)).unwrap();
        store.save_summary(&trap(t0, 1)).unwrap();
        store.save_summary(&trap(t0 + Duration::minutes(1), 2)).unwrap();

        let mut seen = Vec::new();
        store
            .for_each_summary(SourceType::Trap, t0, t0 + Duration::minutes(1), &mut |s| {
                seen.push(s.anomaly_vector()[0]);
                true
            })
            .unwrap();
        assert_eq!(seen, vec![1.0, 2.0]);
    }

    #[test]
    fn visitor_can_stop_early() {
        let store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        for i in 0..5 {
            store.save_summary(&trap(t0 + Duration::minutes(i), i as u64)).unwrap();
        }
        let mut visited = 0;
        store
            .for_each_summary(SourceType::Trap, t0, t0 + Duration::hours(1), &mut |_| {
                visited += 1;
                visited < 2
            })
            .unwrap();
        assert_eq!(visited, 2);
    }

    #[test]
    fn resaved_scores_replace_same_timestamp() {
        let store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let first = AnomalyScore { time: t0, raw_score: 0.4, calibrated_score: 48.0 };
        let second = AnomalyScore { time: t0, raw_score: 0.6, calibrated_score: 61.0 };
        store.save_anomaly_scores(SourceType::Syslog, &[first]).unwrap();
        store.save_anomaly_scores(SourceType::Syslog, &[second.clone()]).unwrap();
        assert_eq!(store.anomaly_scores(SourceType::Syslog), vec![second]);
    }

    #[test]
    fn open_range_covers_everything() {
        let store = MemoryStore::new();
        store.save_summary(&trap(Utc::now(), 1)).unwrap();
        let mut seen = 0;
        store
            .for_each_summary(SourceType::Trap, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC, &mut |_| {
                seen += 1;
                true
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn clear_report_drops_history() {
        let store = MemoryStore::new();
        store.save_summary(&trap(Utc::now(), 1)).unwrap();
        assert_eq!(store.summary_count(SourceType::Trap), 1);
        store.clear_report(SourceType::Trap).unwrap();
        assert_eq!(store.summary_count(SourceType::Trap), 0);
    }
}
