//! One task per source type: fold records into the open window, flush on
//! the boundary, persist the summary and hand its vector to the scorer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use logeye_compute::AggregationWindow;
use logeye_core::{LogRecord, ReportStore, Summary};

use crate::clock::Clock;
use crate::scoring::ScorerMsg;
use crate::shutdown::ShutdownListener;

pub struct WindowTask {
    pub window: AggregationWindow,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn ReportStore>,
    pub scorer: mpsc::Sender<ScorerMsg>,
    pub tick: Duration,
}

impl WindowTask {
    pub async fn run(mut self, mut queue: mpsc::Receiver<LogRecord>, mut shutdown: ShutdownListener) {
        let source = self.window.source_type();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    if self.window.pending() > 0 {
                        info!(source = %source, pending = self.window.pending(), "open window discarded on shutdown");
                    }
                    break;
                }
                next = queue.recv() => match next {
                    Some(record) => self.window.update(&record),
                    None => break,
                },
                _ = interval.tick() => {
                    if let Some(summary) = self.window.tick(self.clock.now()) {
                        self.publish(summary).await;
                    }
                }
            }
        }
        debug!(source = %source, "aggregation task stopped");
    }

    async fn publish(&self, summary: Summary) {
        let source = summary.source_type();
        let time = summary.time();
        if let Err(e) = self.store.save_summary(&summary) {
            warn!(source = %source, error = %e, "failed to persist summary");
        }
        debug!(source = %source, time = %time, "window flushed");

        let msg = ScorerMsg::Observe {
            source,
            time,
            vector: summary.anomaly_vector(),
        };
        if self.scorer.send(msg).await.is_err() {
            debug!(source = %source, "anomaly scorer closed, vector dropped");
        }
    }
}
