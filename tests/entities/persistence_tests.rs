use fitgraph::entities::{Container, EntityRecord, NamedEntity, RecordKind};
use fitgraph::fit::{FitFunction, FreeParameter};
use fitgraph::FitGraphError;

use crate::test_helpers::{parameters, value_of};

#[test]
fn test_flags_survive_round_trip() {
    let mut container = Container::parameters();
    container
        .add_object(
            NamedEntity::parameter("g", "9.81")
                .with_description("gravity")
                .with_name_editable(false)
                .with_synced(true),
            0,
            false,
            &(),
        )
        .unwrap();

    let json = container.to_json().unwrap();
    let mut restored = Container::parameters();
    restored.load_json(&json, &()).unwrap();
    restored.evaluate_all(&());

    let g = restored.get_by_name("g").unwrap();
    assert_eq!(g.description(), Some("gravity"));
    assert!(!g.is_name_editable());
    assert!(g.is_expression_editable());
    assert!(g.is_synced());
    assert_eq!(value_of(&restored, "g"), 9.81);
}

#[test]
fn test_fit_function_round_trip() {
    let fit = FitFunction::expression("t", vec![FreeParameter::new("tau", 2.5)]);
    let mut container = Container::functions(&["t"]);
    container
        .add_object(NamedEntity::fit("decay", "exp(-t/tau)", fit.clone()), 0, false, &())
        .unwrap();

    let records = container.records();
    assert_eq!(records[0].kind, RecordKind::Fit(fit.clone()));

    let mut restored = Container::functions(&["t"]);
    restored.load_records(&records, &()).unwrap();
    assert_eq!(restored.get_by_name("decay").unwrap().fit_function(), Some(&fit));
}

#[test]
fn test_minimal_record_uses_defaults() {
    let json = r#"[{"name": "a", "expression": "1 + 1", "kind": "parameter"}]"#;
    let mut container = Container::parameters();
    container.load_json(json, &()).unwrap();
    container.evaluate_all(&());

    let a = container.get_by_name("a").unwrap();
    assert!(a.is_name_editable());
    assert!(!a.is_synced());
    assert_eq!(a.value(), 2.0);
}

#[test]
fn test_batch_rejected_as_a_whole() {
    let mut container = parameters(&[("taken", "1")]);
    let records = vec![
        EntityRecord::from(&NamedEntity::parameter("fresh", "2")),
        EntityRecord::from(&NamedEntity::parameter("taken", "3")),
    ];

    assert!(matches!(
        container.load_records(&records, &()),
        Err(FitGraphError::RejectedRecord(name)) if name == "taken"
    ));
    assert_eq!(container.names(), vec!["taken"]);

    assert!(matches!(
        container.load_json("not json", &()),
        Err(FitGraphError::JsonError(_))
    ));
}

#[test]
fn test_pending_input_is_persisted() {
    let mut container = parameters(&[("a", "1")]);
    let a = container.get_by_name("a").unwrap().id();
    container.set_expression(a, "1 +", false).unwrap();

    let records = container.records();
    assert_eq!(records[0].expression, "1 +");
}
