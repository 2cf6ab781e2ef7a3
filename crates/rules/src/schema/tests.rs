//! Tests for rule document parsing and compilation.

use super::*;
use logeye_core::Level;

const FAILED_LOGON_YAML: &str = r#"
title: Repeated failed logon
id: win-failed-logon
status: stable
level: high
tags: [attack.credential_access, attack.t1110]
logsource:
  product: windows
  service: security
detection:
  selection:
    EventID: 4625
  filter_machine:
    TargetUserName|endswith: '$'
  condition: selection and not filter_machine
falsepositives:
  - mistyped passwords
"#;

#[test]
fn parse_full_document() {
    let doc = RuleDocument::from_yaml(FAILED_LOGON_YAML).unwrap();
    assert_eq!(doc.id.as_deref(), Some("win-failed-logon"));
    assert_eq!(doc.logsource.product.as_deref(), Some("windows"));
    assert_eq!(doc.tags.len(), 2);

    let rule = DetectionRule::compile(doc, "ignored").unwrap();
    assert_eq!(rule.id, "win-failed-logon");
    assert_eq!(rule.level, Level::High);
    assert_eq!(rule.detection.selections.len(), 2);
    assert_eq!(rule.falsepositives, vec!["mistyped passwords".to_string()]);
}

#[test]
fn id_falls_back_to_file_stem_and_level_defaults_to_medium() {
    let yaml = r#"
title: No id
detection:
  keywords: [segfault]
  condition: keywords
"#;
    let rule = DetectionRule::compile(RuleDocument::from_yaml(yaml).unwrap(), "kernel-segfault").unwrap();
    assert_eq!(rule.id, "kernel-segfault");
    assert_eq!(rule.level, Level::Medium);
}

#[test]
fn informational_level_maps_to_info() {
    let yaml = r#"
title: Info
level: informational
detection:
  sel: {a: 1}
  condition: sel
"#;
    let rule = DetectionRule::compile(RuleDocument::from_yaml(yaml).unwrap(), "x").unwrap();
    assert_eq!(rule.level, Level::Info);
    assert_eq!(rule.info().level, Level::Info);
}

#[test]
fn condition_list_is_an_or() {
    let yaml = r#"
title: Either
detection:
  a: {x: 1}
  b: {y: 2}
  condition:
    - a
    - b
"#;
    let rule = DetectionRule::compile(RuleDocument::from_yaml(yaml).unwrap(), "either").unwrap();
    assert!(matches!(rule.detection.condition, crate::condition::Condition::Or(_)));
}

#[test]
fn compile_errors() {
    let cases = [
        // missing condition
        "title: t\ndetection:\n  sel: {a: 1}\n",
        // unknown level
        "title: t\nlevel: urgent\ndetection:\n  sel: {a: 1}\n  condition: sel\n",
        // condition names a selection that does not exist
        "title: t\ndetection:\n  selection: {a: 1}\n  condition: selektion\n",
        // bad modifier
        "title: t\ndetection:\n  sel: {a|base64: x}\n  condition: sel\n",
        // correlation
        "title: t\ndetection:\n  sel: {a: 1}\n  timeframe: 5m\n  condition: sel\n",
    ];
    for yaml in cases {
        let doc = RuleDocument::from_yaml(yaml).unwrap();
        assert!(DetectionRule::compile(doc, "t").is_err(), "should reject:\n{}", yaml);
    }
}

#[test]
fn missing_detection_is_a_yaml_error() {
    assert!(RuleDocument::from_yaml("title: nothing\n").is_err());
}
