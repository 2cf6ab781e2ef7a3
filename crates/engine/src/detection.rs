//! Detection worker: normalize each queued record and evaluate it against
//! the current rule corpus.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use logeye_core::{LogRecord, NotifyEvent};
use logeye_rules::{Normalizer, RuleCorpus, RuleSet};

use crate::shutdown::ShutdownListener;

/// Evaluate one record. Parse failures and misses yield `None`.
pub fn detect(record: &LogRecord, normalizer: &Normalizer, corpus: &RuleCorpus) -> Option<NotifyEvent> {
    let fields = match normalizer.extract(&record.body) {
        Ok(fields) => fields,
        Err(e) => {
            debug!(source = %record.source, source_type = %record.source_type, error = %e, "record skipped");
            return None;
        }
    };

    let rule = corpus.evaluate(&fields)?;
    Some(NotifyEvent::rule(
        record.time,
        record.source.as_str(),
        record.body.as_str(),
        rule.id.as_str(),
        rule.level,
        rule.title.as_str(),
        rule.tags.clone(),
    ))
}

pub struct DetectionWorker {
    pub rules: RuleSet,
    pub normalizer: Arc<Normalizer>,
    pub events: mpsc::Sender<NotifyEvent>,
}

impl DetectionWorker {
    /// Consume `queue` until it closes or shutdown is signalled. On shutdown
    /// the queue stops accepting and whatever is already buffered is drained.
    pub async fn run(self, mut queue: mpsc::Receiver<LogRecord>, mut shutdown: ShutdownListener) {
        let mut processed = 0u64;
        loop {
            tokio::select! {
                biased;
                next = queue.recv() => match next {
                    Some(record) => {
                        self.handle(&record).await;
                        processed += 1;
                    }
                    None => break,
                },
                _ = shutdown.wait() => {
                    queue.close();
                    let mut drained = 0u64;
                    while let Some(record) = queue.recv().await {
                        self.handle(&record).await;
                        drained += 1;
                    }
                    processed += drained;
                    debug!(drained, "detection queue drained");
                    break;
                }
            }
        }
        info!(processed, "detection worker stopped");
    }

    async fn handle(&self, record: &LogRecord) {
        let corpus = self.rules.snapshot();
        if let Some(event) = detect(record, &self.normalizer, &corpus) {
            debug!(rule_id = %event.rule_id, source = %event.source, "rule matched");
            if self.events.send(event).await.is_err() {
                debug!("notification sink closed, detection dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use logeye_core::{Level, SourceType};
    use logeye_rules::loader::{load_corpus, MemoryRepository, RuleSource};

    use super::*;

    const RULE: &str = "title: Root login\nid: root-login\nlevel: high\ntags: [auth]\n\
detection:\n  selection:\n    user: root\n    action: login\n  condition: selection\n";

    fn corpus() -> RuleCorpus {
        load_corpus(&MemoryRepository::new(vec![RuleSource::new("root.yml", RULE)])).unwrap()
    }

    fn record(body: &str) -> LogRecord {
        LogRecord::new(Utc::now(), SourceType::Syslog, "10.0.0.5", body)
    }

    #[test]
    fn match_builds_rule_event() {
        let rec = record(r#"{"user":"root","action":"login"}"#);
        let event = detect(&rec, &Normalizer::json(), &corpus()).unwrap();
        assert_eq!(event.rule_id, "root-login");
        assert_eq!(event.level, Level::High);
        assert_eq!(event.title, "Root login");
        assert_eq!(event.tags, vec!["auth".to_string()]);
        assert_eq!(event.source, "10.0.0.5");
        assert_eq!(event.body, rec.body);
        assert_eq!(event.time, rec.time);
    }

    #[test]
    fn miss_and_parse_error_yield_nothing() {
        let corpus = corpus();
        assert!(detect(&record(r#"{"user":"bob","action":"login"}"#), &Normalizer::json(), &corpus).is_none());
        assert!(detect(&record("not json"), &Normalizer::json(), &corpus).is_none());
        assert!(detect(&record("[1,2]"), &Normalizer::json(), &corpus).is_none());
    }

    #[tokio::test]
    async fn shutdown_drains_queued_records() {
        let (tx, rx) = mpsc::channel(16);
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let shutdown = crate::Shutdown::new();

        for _ in 0..3 {
            tx.send(record(r#"{"user":"root","action":"login"}"#)).await.unwrap();
        }
        shutdown.trigger();

        let worker = DetectionWorker {
            rules: RuleSet::new(corpus()),
            normalizer: Arc::new(Normalizer::json()),
            events: events_tx,
        };
        worker.run(rx, shutdown.listener()).await;

        let mut seen = 0;
        while let Ok(event) = events_rx.try_recv() {
            assert_eq!(event.rule_id, "root-login");
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(tx.send(record("{}")).await.is_err());
    }
}
