//! Per-source anomaly scoring over summary history.
//!
//! Every flushed summary contributes one vector to its source type's
//! history. Each observation refits an isolation forest over the whole
//! history, rescales the raw scores to 0..=100, calibrates them to a
//! distribution centred on 50 (`10 * z + 50`) and persists the series.
//! The newest point may raise an alert once history is long and old enough.

pub mod iforest;


use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc, Weekday};
use tracing::{debug, info};

use logeye_core::config::AnomalyConfig;
use logeye_core::{AnomalyScore, NotifyEvent, ReportStore, SourceType, StoreError};

use iforest::IsolationForest;

const DEFAULT_SEED: u64 = 0x5eed_1e7e;

/// History span required before time-of-week features are added.
const TIME_FEATURE_SPAN_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// Every point got the same raw score; the cycle is skipped.
    #[error("degenerate scores for {0}: all points scored identically")]
    Degenerate(SourceType),

    #[error("report store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub time: DateTime<Utc>,
    pub vector: Vec<f64>,
}

/// Result of one observation.
#[derive(Debug, Clone)]
pub enum ScoreOutcome {
    /// Not enough history to fit a model yet.
    Insufficient { points: usize },
    Scored {
        scores: Vec<AnomalyScore>,
        alert: Option<NotifyEvent>,
    },
}

pub struct AnomalyScorer {
    config: AnomalyConfig,
    store: Arc<dyn ReportStore>,
    history: HashMap<SourceType, Vec<HistoryPoint>>,
    seed: u64,
}

impl AnomalyScorer {
    pub fn new(config: AnomalyConfig, store: Arc<dyn ReportStore>) -> Self {
        Self {
            config,
            store,
            history: HashMap::new(),
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// A scorer with the same settings and store but no history.
    pub fn blank(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            history: HashMap::new(),
            seed: self.seed,
        }
    }

    pub fn history_len(&self, source: SourceType) -> usize {
        self.history.get(&source).map_or(0, Vec::len)
    }

    /// Replace the in-memory history of `source` with what the store holds.
    pub fn load_history(&mut self, source: SourceType) -> Result<usize, StoreError> {
        let mut points = Vec::new();
        self.store.for_each_summary(
            source,
            DateTime::<Utc>::MIN_UTC,
            DateTime::<Utc>::MAX_UTC,
            &mut |summary| {
                points.push(HistoryPoint {
                    time: summary.time(),
                    vector: summary.anomaly_vector(),
                });
                true
            },
        )?;
        let count = points.len();
        self.history.insert(source, points);
        debug!(source = %source, points = count, "anomaly history loaded");
        Ok(count)
    }

    /// Seed every source type from the store.
    pub fn load_all(&mut self) -> Result<(), StoreError> {
        for source in SourceType::ALL {
            self.load_history(source)?;
        }
        Ok(())
    }

    /// Discard history for one type and reload it from the store.
    pub fn clear(&mut self, source: SourceType) -> Result<usize, StoreError> {
        self.history.remove(&source);
        let count = self.load_history(source)?;
        info!(source = %source, points = count, "anomaly history cleared and reloaded");
        Ok(count)
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.history.clear();
        for source in SourceType::ALL {
            self.clear(source)?;
        }
        Ok(())
    }

    /// Append a new summary vector and rescore the history. A vector whose
    /// time equals the newest point's replaces it rather than adding a copy.
    pub fn observe(
        &mut self,
        source: SourceType,
        time: DateTime<Utc>,
        vector: Vec<f64>,
    ) -> Result<ScoreOutcome, ComputeError> {
        let history = self.history.entry(source).or_default();
        match history.last_mut() {
            // Already loaded from the store by a clear that raced the flush.
            Some(newest) if newest.time == time => newest.vector = vector,
            _ => history.push(HistoryPoint { time, vector }),
        }

        if history.len() < self.config.min_points {
            return Ok(ScoreOutcome::Insufficient {
                points: history.len(),
            });
        }

        let dims = history.last().map_or(0, |p| p.vector.len());
        let points: Vec<&HistoryPoint> = history.iter().filter(|p| p.vector.len() == dims).collect();
        if points.len() < self.config.min_points {
            return Ok(ScoreOutcome::Insufficient {
                points: points.len(),
            });
        }

        let span = span(&points);
        let with_time = self.config.use_time_data && span >= TimeDelta::days(TIME_FEATURE_SPAN_DAYS);
        let matrix: Vec<Vec<f64>> = points.iter().map(|p| features(p, with_time)).collect();

        let seed = self.seed.wrapping_add(matrix.len() as u64);
        let forest = IsolationForest::fit(&matrix, self.config.trees, self.config.sample_size, seed);
        let raw = forest.score_all(&matrix);

        let calibrated = calibrate(&raw).ok_or(ComputeError::Degenerate(source))?;
        let scores: Vec<AnomalyScore> = points
            .iter()
            .zip(raw.iter().zip(calibrated))
            .map(|(p, (raw_score, calibrated_score))| AnomalyScore {
                time: p.time,
                raw_score: *raw_score,
                calibrated_score,
            })
            .collect();

        self.store.save_anomaly_scores(source, &scores)?;

        let alert = scores
            .last()
            .filter(|_| self.alert_ready(scores.len(), span))
            .and_then(|latest| {
                let threshold = self.config.threshold?;
                (latest.calibrated_score > threshold)
                    .then(|| NotifyEvent::anomaly(latest.time, source, latest.calibrated_score))
            });

        Ok(ScoreOutcome::Scored { scores, alert })
    }

    fn alert_ready(&self, points: usize, span: TimeDelta) -> bool {
        points >= self.config.min_alert_points
            && span > TimeDelta::hours(i64::from(self.config.notify_delay_hours))
    }
}

fn span(points: &[&HistoryPoint]) -> TimeDelta {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => last.time - first.time,
        _ => TimeDelta::zero(),
    }
}

fn features(point: &HistoryPoint, with_time: bool) -> Vec<f64> {
    let mut out = point.vector.clone();
    if with_time {
        let weekend = matches!(point.time.weekday(), Weekday::Sat | Weekday::Sun);
        out.push(if weekend { 1.0 } else { 0.0 });
        out.push(f64::from(point.time.hour()));
    }
    out
}

/// Min-max scale to 0..=100, then `10 * (x - mean) / stddev + 50` using
/// the sample standard deviation. `None` when every score is equal.
pub fn calibrate(raw: &[f64]) -> Option<Vec<f64>> {
    if raw.len() < 2 {
        return None;
    }
    let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return None;
    }

    let scaled: Vec<f64> = raw.iter().map(|x| (x - min) / (max - min) * 100.0).collect();
    let n = scaled.len() as f64;
    let mean = scaled.iter().sum::<f64>() / n;
    let variance = scaled.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return None;
    }

    Some(scaled.iter().map(|x| 10.0 * (x - mean) / stddev + 50.0).collect())
}
