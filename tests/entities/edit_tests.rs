use fitgraph::entities::{ChangeEvent, Container, EditKind, EditedProperty, EventLog, NamedEntity};

use crate::test_helpers::{id_of, parameters};

#[test]
fn test_expression_edit_record_and_event() {
    let mut container = parameters(&[("a", "1"), ("b", "a + 1")]);
    let log = EventLog::new();
    container.add_listener(Box::new(log.clone()));
    let a = id_of(&container, "a");

    let applied = container.set_expression(a, "2", true).unwrap();
    let edit = applied.edit.unwrap();
    assert_eq!(edit.kind, EditKind::Expression);
    assert_eq!(edit.row, 0);
    assert_eq!(edit.previous_expression.as_deref(), Some("1"));
    assert_eq!(edit.entity.expression, "2");
    assert_eq!(edit.prior_state[0].expression, "1");

    assert_eq!(
        log.events(),
        vec![ChangeEvent::Edited {
            id: applied.id,
            previous_id: a,
            property: EditedProperty::Expression,
            old: "1".to_string(),
            new: "2".to_string(),
        }]
    );
}

#[test]
fn test_rename_edit_record() {
    let mut container = Container::functions(&["x"]);
    let f = container
        .add_object(NamedEntity::function("f", "x"), 0, false, &())
        .unwrap()
        .id;
    let log = EventLog::new();
    container.add_listener(Box::new(log.clone()));

    let edit = container.rename(f, "g", true, &()).unwrap().edit.unwrap();
    assert_eq!(edit.kind, EditKind::Rename);
    assert_eq!(edit.previous_name.as_deref(), Some("f"));
    assert_eq!(edit.entity.name, "g");

    let events = log.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].is_structural());
}

#[test]
fn test_rejected_edits_fire_nothing() {
    let mut container = parameters(&[("a", "1"), ("b", "2")]);
    let log = EventLog::new();
    container.add_listener(Box::new(log.clone()));
    let b = id_of(&container, "b");

    assert!(container.rename(b, "a", true, &()).is_none());
    assert!(container.rename(b, "not a name", true, &()).is_none());
    assert!(container
        .add_object(NamedEntity::parameter("pi", "3"), 0, true, &())
        .is_none());
    assert!(log.is_empty());
}

#[test]
fn test_locked_entities() {
    let mut container = Container::parameters();
    let fixed = container
        .add_object(
            NamedEntity::parameter("fixed", "1")
                .with_name_editable(false)
                .with_expression_editable(false)
                .with_important(true),
            0,
            false,
            &(),
        )
        .unwrap()
        .id;

    assert!(container.rename(fixed, "other", false, &()).is_none());
    assert!(container.set_expression(fixed, "2", false).is_none());
    assert!(container.remove_object(fixed, false).is_none());
    assert_eq!(container.get(fixed).unwrap().expression(), "1");
}

#[test]
fn test_remove_record_keeps_removed_entity() {
    let mut container = parameters(&[("a", "1"), ("b", "2")]);
    let a = id_of(&container, "a");
    let edit = container.remove_object(a, true).unwrap().edit.unwrap();

    assert_eq!(edit.kind, EditKind::Remove);
    assert_eq!(edit.entity.name, "a");
    assert_eq!(edit.prior_state.len(), 2);
    assert_eq!(container.names(), vec!["b"]);
    assert!(container.get(a).is_none());
}
