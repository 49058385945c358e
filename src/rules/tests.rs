use crate::{Channel, ConfigError, Kind, RuleSpec, RuleTable};

const TWO_RULES: &str = r#"
nostart:
  kind: ERROR
  location: STDOUT
  regex: 'starting program'
  message: 'The program never started.'
  suggestion: ''
  recover: false
  inverse: true
brmix:
  kind: error
  location: STDOUT
  regex: 'BRMIX: very serious problems'
  message: 'Problems with the charge density mixing.'
  suggestion: 'Restart from scratch.'
  recover: false
"#;

#[test]
fn yaml_table_keeps_mapping_order_and_fields() {
    let table = RuleTable::from_yaml_str(TWO_RULES).unwrap();
    let ids: Vec<_> = table.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["nostart", "brmix"]);

    let nostart = table.get("nostart").unwrap();
    assert!(nostart.inverse);
    assert!(nostart.is_fatal());
    assert_eq!(nostart.suggestion, "");

    let brmix = table.get("brmix").unwrap();
    assert_eq!(brmix.kind, Kind::Error);
    assert_eq!(brmix.location, Channel::Stdout);
    assert!(!brmix.inverse);
    assert_eq!(brmix.suggestion, "Restart from scratch.");
    assert_eq!(brmix.to_string(), "(ERROR) brmix: Problems with the charge density mixing.");
}

#[test]
fn optional_fields_take_defaults() {
    let yaml = "eddrmm:\n  kind: WARNING\n  regex: 'EDDRMM'\n  message: 'RMM-DIIS trouble.'\n";
    let table = RuleTable::from_yaml_str(yaml).unwrap();
    let rule = table.get("eddrmm").unwrap();
    assert_eq!(rule.location, Channel::Stdout);
    assert!(!rule.recoverable);
    assert!(!rule.inverse);
    assert!(rule.suggestion.is_empty());
}

#[test]
fn unique_ids_build_and_a_duplicate_always_fails() {
    let specs: Vec<RuleSpec> = (0..6)
        .map(|i| RuleSpec::new(format!("rule{i}"), Kind::Warning, Channel::Stdout, format!("pattern {i}")))
        .collect();
    assert_eq!(RuleTable::new(specs.clone()).unwrap().len(), 6);

    for dup in 0..specs.len() {
        let mut with_dup = specs.clone();
        with_dup.push(RuleSpec::new(format!("rule{dup}"), Kind::Error, Channel::Stderr, "other"));
        match RuleTable::new(with_dup) {
            Err(ConfigError::DuplicateId(id)) => assert_eq!(id, format!("rule{dup}")),
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }
}

#[test]
fn duplicate_yaml_keys_are_reported_as_duplicate_ids() {
    let yaml = format!("{TWO_RULES}brmix:\n  kind: WARNING\n  regex: 'x'\n  message: 'again'\n");
    assert!(matches!(RuleTable::from_yaml_str(&yaml), Err(ConfigError::DuplicateId(id)) if id == "brmix"));
}

#[test]
fn invalid_records_are_config_errors() {
    let bad_kind = "a:\n  kind: FATAL\n  regex: 'x'\n  message: 'm'\n";
    assert!(matches!(
        RuleTable::from_yaml_str(bad_kind),
        Err(ConfigError::UnknownKind { id, value }) if id == "a" && value == "FATAL"
    ));

    let bad_location = "a:\n  kind: ERROR\n  location: OUTCAR\n  regex: 'x'\n  message: 'm'\n";
    assert!(matches!(
        RuleTable::from_yaml_str(bad_location),
        Err(ConfigError::UnknownLocation { value, .. }) if value == "OUTCAR"
    ));

    let empty = "a:\n  kind: ERROR\n  regex: ''\n  message: 'm'\n";
    assert!(matches!(RuleTable::from_yaml_str(empty), Err(ConfigError::EmptyPattern(id)) if id == "a"));

    let broken = "a:\n  kind: ERROR\n  regex: '(unclosed'\n  message: 'm'\n";
    assert!(matches!(RuleTable::from_yaml_str(broken), Err(ConfigError::InvalidPattern { .. })));

    let missing_message = "a:\n  kind: ERROR\n  regex: 'x'\n";
    assert!(matches!(RuleTable::from_yaml_str(missing_message), Err(ConfigError::Parse(_))));

    assert!(matches!(RuleTable::from_yaml_str("- just\n- a list\n"), Err(ConfigError::Parse(_))));
}

const OVERRIDES: &str = r#"
brmix:
  kind: WARNING
  regex: 'internal error'
  message: 'some error'
  suggestion: 'none'
  recover: true
zbrent:
  kind: ERROR
  regex: 'ZBRENT'
  message: 'bracketing'
"#;

#[test]
fn overrides_replace_in_place_and_append_new_rules() {
    let table = RuleTable::from_yaml_str(TWO_RULES).unwrap();
    let overridden = table.with_yaml_overrides(OVERRIDES).unwrap();

    let ids: Vec<_> = overridden.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["nostart", "brmix", "zbrent"]);

    let brmix = overridden.get("brmix").unwrap();
    assert_eq!(brmix.kind, Kind::Warning);
    assert_eq!(brmix.pattern.as_str(), "internal error");
    assert_eq!(brmix.message, "some error");
    assert_eq!(brmix.suggestion, "none");
    assert!(brmix.recoverable);

    // The source table is untouched.
    assert_eq!(table.get("brmix").unwrap().kind, Kind::Error);
    assert_eq!(table.len(), 2);
}

#[test]
fn default_table_loads() {
    let table = RuleTable::vasp_default();
    assert!(!table.is_empty());
    assert_eq!(table.kinds(), vec![Kind::Error, Kind::Warning]);

    let ibzkpt = table.get("ibzkpt").unwrap();
    assert_eq!(ibzkpt.to_string(), "(ERROR) ibzkpt: Error with the k-points.");
    assert!(ibzkpt.recoverable);

    let nostart = table.get("nostart").unwrap();
    assert!(nostart.inverse);
    assert_eq!(nostart.kind, Kind::Error);

    assert!(table.iter().any(|r| r.location == Channel::Stderr));
}

#[test]
fn spec_round_trips_through_the_rule() {
    let spec = RuleSpec::new("edddav", Kind::Error, Channel::Stdout, "Error EDDDAV")
        .message("Davidson failed.")
        .suggestion("Switch ALGO.")
        .recoverable(true);
    let table = RuleTable::new(vec![spec.clone()]).unwrap();
    assert_eq!(table.rules()[0].to_spec(), spec);
}
