//! Integration tests that load the sample rules in `data/rules/` and check
//! them against representative records.

use std::path::PathBuf;

use logeye_core::{FieldMap, FieldValue, Level};
use logeye_rules::loader::{load_corpus, DirectoryRepository};
use logeye_rules::normalizer::{GrokDefinitions, Normalizer};
use logeye_rules::RuleCorpus;

/// Integration tests run from the crate directory, so we go up two levels.
fn rules_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/rules")
}

fn corpus() -> RuleCorpus {
    load_corpus(&DirectoryRepository::new(rules_dir()))
        .unwrap_or_else(|e| panic!("sample rules should load: {e}"))
}

fn json(body: &str) -> FieldMap {
    Normalizer::json().extract(body).unwrap()
}

#[test]
fn all_sample_rules_load() {
    let corpus = corpus();
    let ids: Vec<String> = corpus.rule_list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 5);
    for expected in [
        "win-failed-logon",
        "win-audit-log-cleared",
        "linux-ssh-failed-password",
        "linux-su-root-failure",
        "mqtt-wildcard-subscribe",
    ] {
        assert!(ids.iter().any(|id| id == expected), "missing {expected}");
    }
}

#[test]
fn windows_failed_logon() {
    let corpus = corpus();
    let hit = corpus
        .evaluate(&json(r#"{"EventID": 4625, "TargetUserName": "alice"}"#))
        .unwrap();
    assert_eq!(hit.id, "win-failed-logon");
    assert_eq!(hit.level, Level::Medium);
    assert!(hit.tags.contains(&"attack.t1110".to_string()));

    assert!(corpus
        .evaluate(&json(r#"{"EventID": 4624, "TargetUserName": "alice"}"#))
        .is_none());
    assert!(corpus
        .evaluate(&json(r#"{"EventID": 4625, "TargetUserName": "WS01$"}"#))
        .is_none());
}

#[test]
fn grok_normalized_syslog_hits_su_rule() {
    let normalizer = Normalizer::grok(
        r"%{SYSLOGTIMESTAMP:timestamp} %{SYSLOGHOST:host} %{SYSLOGPROG}: %{GREEDYDATA:message}",
        &GrokDefinitions::default(),
    );
    let fields = normalizer
        .extract("Oct 11 22:14:15 mymachine su: 'su root' failed for lonvick on /dev/pts/8")
        .unwrap();
    let corpus = corpus();
    let hit = corpus.evaluate(&fields).unwrap();
    assert_eq!(hit.id, "linux-su-root-failure");
    assert_eq!(hit.level, Level::High);
}

#[test]
fn mqtt_wildcard_topic() {
    let mut fields = FieldMap::new();
    fields.insert("client_id".into(), FieldValue::from("sensor-7"));
    fields.insert("topic".into(), FieldValue::from("#"));
    assert_eq!(corpus().evaluate(&fields).unwrap().id, "mqtt-wildcard-subscribe");

    fields.insert("topic".into(), FieldValue::from("home/kitchen/temp"));
    assert!(corpus().evaluate(&fields).is_none());
}
