//! Anomaly scorer task. Owns the per-type history; scoring runs on the
//! blocking pool so forest fitting never stalls the runtime. A failed
//! scoring job loses the in-memory history, which is rebuilt from the store.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use logeye_compute::{AnomalyScorer, ComputeError, ScoreOutcome};
use logeye_core::{NotifyEvent, SourceType};

use crate::error::EngineError;
use crate::shutdown::ShutdownListener;

#[derive(Debug)]
pub enum ScorerMsg {
    Observe {
        source: SourceType,
        time: DateTime<Utc>,
        vector: Vec<f64>,
    },
    /// Drop history for one type (or all when `None`) and reload it.
    Clear {
        source: Option<SourceType>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

pub struct ScorerTask {
    pub scorer: AnomalyScorer,
    pub events: mpsc::Sender<NotifyEvent>,
}

impl ScorerTask {
    pub async fn run(self, mut queue: mpsc::Receiver<ScorerMsg>, mut shutdown: ShutdownListener) {
        let ScorerTask { mut scorer, events } = self;
        let spare = scorer.blank();
        loop {
            let msg = tokio::select! {
                _ = shutdown.wait() => break,
                next = queue.recv() => match next {
                    Some(msg) => msg,
                    None => break,
                },
            };

            match msg {
                ScorerMsg::Observe { source, time, vector } => {
                    let joined = tokio::task::spawn_blocking(move || {
                        let outcome = scorer.observe(source, time, vector);
                        (scorer, outcome)
                    })
                    .await;
                    let outcome = match joined {
                        Ok((returned, outcome)) => {
                            scorer = returned;
                            outcome
                        }
                        Err(e) => {
                            warn!(source = %source, error = %e, "anomaly scoring job failed, reloading history");
                            scorer = spare.blank();
                            if let Err(e) = scorer.load_all() {
                                warn!(error = %e, "failed to reload anomaly history");
                            }
                            continue;
                        }
                    };
                    if let Some(alert) = handle_outcome(source, outcome) {
                        if events.send(alert).await.is_err() {
                            debug!("notification sink closed, anomaly alert dropped");
                        }
                    }
                }
                ScorerMsg::Clear { source, reply } => {
                    let result = match source {
                        Some(source) => scorer.clear(source).map(|_| ()),
                        None => scorer.clear_all(),
                    };
                    let _ = reply.send(result.map_err(EngineError::from));
                }
            }
        }
        debug!("anomaly scorer stopped");
    }
}

fn handle_outcome(
    source: SourceType,
    outcome: Result<ScoreOutcome, ComputeError>,
) -> Option<NotifyEvent> {
    match outcome {
        Ok(ScoreOutcome::Insufficient { points }) => {
            debug!(source = %source, points, "not enough history to score");
            None
        }
        Ok(ScoreOutcome::Scored { scores, alert }) => {
            if let Some(latest) = scores.last() {
                debug!(source = %source, points = scores.len(), score = latest.calibrated_score, "anomaly scores updated");
            }
            if let Some(event) = &alert {
                info!(source = %source, score = ?event.score, "anomaly detected");
            }
            alert
        }
        Err(ComputeError::Degenerate(_)) => {
            debug!(source = %source, "all points scored alike, cycle skipped");
            None
        }
        Err(e) => {
            warn!(source = %source, error = %e, "anomaly scoring failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::{TimeDelta, TimeZone};
    use logeye_core::config::AnomalyConfig;
    use logeye_core::{AnomalyScore, MemoryStore, ReportStore, StoreError, Summary, TrapSummary};

    use crate::shutdown::Shutdown;

    /// Store whose first score write panics.
    struct FlakyStore {
        inner: MemoryStore,
        armed: AtomicBool,
    }

    impl ReportStore for FlakyStore {
        fn for_each_summary(
            &self,
            source: SourceType,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            visit: &mut dyn FnMut(&Summary) -> bool,
        ) -> Result<(), StoreError> {
            self.inner.for_each_summary(source, start, end, visit)
        }

        fn save_summary(&self, summary: &Summary) -> Result<(), StoreError> {
            self.inner.save_summary(summary)
        }

        fn for_each_anomaly_score(
            &self,
            source: SourceType,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            visit: &mut dyn FnMut(&AnomalyScore) -> bool,
        ) -> Result<(), StoreError> {
            self.inner.for_each_anomaly_score(source, start, end, visit)
        }

        fn save_anomaly_scores(
            &self,
            source: SourceType,
            scores: &[AnomalyScore],
        ) -> Result<(), StoreError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("score write failed");
            }
            self.inner.save_anomaly_scores(source, scores)
        }

        fn save_notify(&self, event: &NotifyEvent) -> Result<(), StoreError> {
            self.inner.save_notify(event)
        }
    }

    fn trap(i: i64) -> Summary {
        Summary::Trap(TrapSummary {
            time: Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap() + TimeDelta::hours(i),
            count: 10 + (i % 4) as u64,
            types: 1,
            top_list: Vec::new(),
        })
    }

    #[tokio::test]
    async fn scorer_survives_a_failed_scoring_job() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(true),
        });
        for i in 0..9 {
            store.save_summary(&trap(i)).unwrap();
        }
        let config = AnomalyConfig {
            threshold: None,
            trees: 20,
            sample_size: 16,
            ..AnomalyConfig::default()
        };
        let mut scorer = AnomalyScorer::new(config, store.clone());
        scorer.load_all().unwrap();

        let shutdown = Shutdown::new();
        let (events, _events_rx) = mpsc::channel(8);
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(ScorerTask { scorer, events }.run(rx, shutdown.listener()));

        let tenth = trap(9);
        tx.send(ScorerMsg::Observe {
            source: SourceType::Trap,
            time: tenth.time(),
            vector: tenth.anomaly_vector(),
        })
        .await
        .unwrap();

        let (reply, answer) = oneshot::channel();
        tx.send(ScorerMsg::Clear {
            source: Some(SourceType::Trap),
            reply,
        })
        .await
        .unwrap();
        assert!(answer.await.unwrap().is_ok());
        assert!(!task.is_finished());

        shutdown.trigger();
        task.await.unwrap();
    }
}
