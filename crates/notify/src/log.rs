//! Channel that writes detections to the tracing log.

use crate::traits::{Notification, Notifier, NotifyError};

/// Emits every notification as a structured `warn!` event.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let event = &notification.event;
        tracing::warn!(
            target: "logeye::detection",
            rule_id = %event.rule_id,
            level = %event.level,
            source = %event.source,
            score = ?event.score,
            subject = %notification.subject,
            "{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
