//! End-to-end tests: records in, detections, summaries and anomaly alerts out.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tokio::sync::broadcast;

use logeye_core::{
    Config, DetectionKind, Level, LogRecord, MemoryStore, NotifyEvent, RecordDetail, ReportStore,
    SourceType, Summary, TrapSummary,
};
use logeye_engine::{Engine, EngineError, ManualClock};
use logeye_notify::Dispatcher;
use logeye_rules::loader::{DirectoryRepository, MemoryRepository, RuleSource};

const FAILED_LOGON: &str = "title: Failed logon\nid: failed-logon\nlevel: medium\n\
detection:\n  selection:\n    EventID: 4625\n  condition: selection\n";

const AUDIT_CLEARED: &str = "title: Audit log cleared\nid: audit-cleared\nlevel: high\n\
detection:\n  selection:\n    EventID: 1102\n  condition: selection\n";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 30).unwrap()
}

fn memory_repo() -> Arc<MemoryRepository> {
    Arc::new(MemoryRepository::new(vec![RuleSource::new(
        "failed-logon.yml",
        FAILED_LOGON,
    )]))
}

fn windows_record(event_id: u32) -> LogRecord {
    LogRecord::new(
        t0(),
        SourceType::WindowsEvent,
        "dc-01",
        format!(r#"{{"EventID": {event_id}, "TargetUserName": "alice"}}"#),
    )
}

struct Harness {
    engine: Engine,
    store: Arc<MemoryStore>,
    clock: ManualClock,
}

fn start(config: Config, repo: Arc<dyn logeye_rules::loader::RuleRepository>, store: Arc<MemoryStore>) -> Harness {
    let clock = ManualClock::new(t0());
    let engine = Engine::builder(config)
        .repository(repo)
        .store(store.clone())
        .dispatcher(Dispatcher::empty())
        .clock(Arc::new(clock.clone()))
        .tick(Duration::from_millis(10))
        .seed(11)
        .start()
        .unwrap();
    Harness { engine, store, clock }
}

async fn next_event(rx: &mut broadcast::Receiver<NotifyEvent>) -> NotifyEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a detection")
        .expect("subscriber channel closed")
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn matching_record_is_notified_and_recorded() {
    let h = start(Config::default(), memory_repo(), Arc::new(MemoryStore::new()));
    let mut rx = h.engine.subscribe();

    h.engine.submit(windows_record(4624)).await.unwrap();
    h.engine.submit(windows_record(4625)).await.unwrap();

    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, DetectionKind::Rule);
    assert_eq!(event.rule_id, "failed-logon");
    assert_eq!(event.level, Level::Medium);
    assert_eq!(event.source, "dc-01");

    h.engine.shutdown().await.unwrap();
    assert_eq!(h.store.notifications().len(), 1);
}

#[tokio::test]
async fn shutdown_drains_detection_queue() {
    let h = start(Config::default(), memory_repo(), Arc::new(MemoryStore::new()));
    for _ in 0..50 {
        h.engine.submit(windows_record(4625)).await.unwrap();
    }
    h.engine.shutdown().await.unwrap();
    assert_eq!(h.store.notifications().len(), 50);
}

#[tokio::test]
async fn monitor_records_are_never_evaluated() {
    let h = start(Config::default(), memory_repo(), Arc::new(MemoryStore::new()));
    let record = LogRecord::new(t0(), SourceType::Monitor, "localhost", r#"{"EventID": 4625}"#);
    h.engine.submit(record).await.unwrap();
    h.engine.shutdown().await.unwrap();
    assert!(h.store.notifications().is_empty());
}

#[tokio::test]
async fn window_flushes_on_boundary() {
    let h = start(Config::default(), memory_repo(), Arc::new(MemoryStore::new()));

    for (severity, message) in [(6, "session opened for user 1001"), (3, "disk /dev/sda1 failed")] {
        let record = LogRecord::new(t0(), SourceType::Syslog, "web-1", message).with_detail(
            RecordDetail::Syslog {
                severity,
                host: "web-1".to_string(),
                tag: "kernel".to_string(),
                message: message.to_string(),
            },
        );
        h.engine.submit(record).await.unwrap();
    }

    // let the window task consume the queue before the boundary passes
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.clock.advance(TimeDelta::minutes(1));

    let store = h.store.clone();
    wait_until(|| store.summary_count(SourceType::Syslog) >= 1).await;

    let summaries = h.store.summaries(SourceType::Syslog);
    let Summary::Syslog(summary) = &summaries[0] else {
        panic!("expected a syslog summary");
    };
    assert_eq!(summary.time, Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap());
    assert_eq!(summary.normal + summary.warn + summary.error, 2);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.patterns, 2);
    assert!(summary.top_list.len() <= 10);

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn anomalous_window_raises_alert() {
    let store = Arc::new(MemoryStore::new());
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for i in 0..29 {
        store
            .save_summary(&Summary::Trap(TrapSummary {
                time: base + TimeDelta::hours(i),
                count: 10 + (i % 3) as u64,
                types: 1,
                top_list: Vec::new(),
            }))
            .unwrap();
    }

    let mut config = Config::default();
    config.anomaly.threshold = Some(70.0);
    config.anomaly.notify_delay_hours = 0;
    config.anomaly.trees = 100;
    config.anomaly.sample_size = 64;

    let h = start(config, memory_repo(), store);
    let mut rx = h.engine.subscribe();

    for _ in 0..500 {
        let record = LogRecord::new(t0(), SourceType::Trap, "switch-1", "linkDown").with_detail(
            RecordDetail::Trap {
                sender: "switch-1".to_string(),
                trap_type: "linkDown".to_string(),
            },
        );
        h.engine.submit(record).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.clock.advance(TimeDelta::minutes(1));

    let event = next_event(&mut rx).await;
    assert_eq!(event.kind, DetectionKind::Anomaly);
    assert_eq!(event.level, Level::High);
    assert_eq!(event.rule_id, "trap");
    assert!(event.score.unwrap() > 70.0);
    assert_eq!(h.store.anomaly_scores(SourceType::Trap).len(), 30);

    h.engine.clear_anomaly_data(Some(SourceType::Trap)).await.unwrap();
    h.engine.clear_anomaly_data(None).await.unwrap();
    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_reload_keeps_previous_corpus() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("failed-logon.yml"), FAILED_LOGON).unwrap();

    let repo = Arc::new(DirectoryRepository::new(dir.path()));
    let h = start(Config::default(), repo, Arc::new(MemoryStore::new()));
    assert_eq!(h.engine.rule_list().len(), 1);

    fs::write(dir.path().join("broken.yml"), "title: [unclosed").unwrap();
    assert!(matches!(h.engine.reload(), Err(EngineError::Rules(_))));
    assert_eq!(h.engine.rule_list().len(), 1);

    fs::remove_file(dir.path().join("broken.yml")).unwrap();
    fs::write(dir.path().join("audit-cleared.yml"), AUDIT_CLEARED).unwrap();
    assert_eq!(h.engine.reload().unwrap(), 2);

    let ids: Vec<String> = h.engine.rule_list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["audit-cleared".to_string(), "failed-logon".to_string()]);

    let mut rx = h.engine.subscribe();
    h.engine.submit(windows_record(1102)).await.unwrap();
    assert_eq!(next_event(&mut rx).await.rule_id, "audit-cleared");

    h.engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn initial_load_failure_is_fatal() {
    let repo = Arc::new(MemoryRepository::new(vec![RuleSource::new("bad.yml", "detection: 3")]));
    let result = Engine::builder(Config::default())
        .repository(repo)
        .dispatcher(Dispatcher::empty())
        .start();
    assert!(matches!(result, Err(EngineError::Rules(_))));
}

#[test]
fn parse_rule_returns_id_or_error() {
    assert_eq!(Engine::parse_rule(FAILED_LOGON).unwrap(), "failed-logon");
    assert!(Engine::parse_rule("title: no detection\nid: x\n").is_err());
}
