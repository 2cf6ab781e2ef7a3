//! Notification sink: every detection, rule or anomaly, is appended to the
//! report store, published to subscribers and handed to the delivery task.
//!
//! Channel delivery runs on its own task behind a bounded queue. When that
//! queue is full the notification is skipped, never the record or the
//! broadcast, so a stalled channel cannot back up detection.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use logeye_core::{NotifyEvent, ReportStore};
use logeye_notify::Dispatcher;

/// Pending deliveries held before new ones are skipped.
pub const DELIVERY_QUEUE: usize = 256;

pub struct NotifySink {
    pub store: Arc<dyn ReportStore>,
    pub dispatcher: Dispatcher,
    pub subscribers: broadcast::Sender<NotifyEvent>,
}

impl NotifySink {
    /// Runs until every producer has dropped its sender, so detections
    /// drained during shutdown are still recorded. Queued deliveries are
    /// finished before returning.
    pub async fn run(self, mut queue: mpsc::Receiver<NotifyEvent>) {
        let NotifySink {
            store,
            dispatcher,
            subscribers,
        } = self;
        let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_QUEUE);
        let delivery = tokio::spawn(deliver(dispatcher, delivery_rx));

        let mut recorded = 0u64;
        let mut skipped = 0u64;
        while let Some(event) = queue.recv().await {
            if let Err(e) = store.save_notify(&event) {
                warn!(rule_id = %event.rule_id, error = %e, "failed to record detection");
            }
            // no subscribers is fine
            let _ = subscribers.send(event.clone());
            match delivery_tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    skipped += 1;
                    warn!(rule_id = %event.rule_id, "notification channels backed up, delivery skipped");
                }
                Err(TrySendError::Closed(_)) => {
                    skipped += 1;
                    debug!("delivery task gone, notification skipped");
                }
            }
            recorded += 1;
        }

        drop(delivery_tx);
        if let Err(e) = delivery.await {
            warn!(error = %e, "notification delivery task failed");
        }
        debug!(recorded, skipped, "notification sink stopped");
    }
}

async fn deliver(dispatcher: Dispatcher, mut queue: mpsc::Receiver<NotifyEvent>) {
    while let Some(event) = queue.recv().await {
        dispatcher.dispatch(&event).await;
    }
}
