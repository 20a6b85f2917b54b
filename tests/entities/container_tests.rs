use fitgraph::entities::{Container, EntityState, EventLog, NamedEntity};

use crate::test_helpers::{id_of, parameters, value_of};

#[test]
fn test_no_op_update_returns_same_entity_silently() {
    let mut container = parameters(&[("k", "2"), ("m", "k * 4")]);
    let log = EventLog::new();
    container.add_listener(Box::new(log.clone()));

    for name in ["k", "m"] {
        let id = id_of(&container, name);
        let expression = container.get(id).unwrap().expression().to_string();
        assert_eq!(
            container.create_or_update(name, &expression, Some(id), None, &()),
            Some(id)
        );
    }
    assert!(log.is_empty());

    let mut functions = Container::functions(&["x"]);
    let f = functions
        .add_object(NamedEntity::function("f", "x^2"), 0, false, &())
        .unwrap()
        .id;
    functions.add_listener(Box::new(log.clone()));
    assert_eq!(functions.create_or_update("f", "x^2", Some(f), None, &()), Some(f));
    assert!(log.is_empty());
}

#[test]
fn test_mutual_reference_is_circular() {
    let container = parameters(&[("a", "b * 2"), ("b", "a / 2"), ("c", "1")]);
    let a = id_of(&container, "a");
    let b = id_of(&container, "b");

    assert!(container.circular_errors().contains(&a));
    assert!(container.circular_errors().contains(&b));
    assert!(!container.evaluation_order().contains(&a));
    assert!(!container.evaluation_order().contains(&b));
    assert_eq!(container.evaluation_order(), &[id_of(&container, "c")]);
}

#[test]
fn test_breaking_a_cycle_restores_evaluation() {
    let mut container = parameters(&[("a", "b + 1"), ("b", "a + 1")]);
    let b = id_of(&container, "b");
    container.create_or_update("b", "5", Some(b), None, &()).unwrap();
    container.evaluate_all(&());

    assert!(container.circular_errors().is_empty());
    assert_eq!(value_of(&container, "a"), 6.0);
    assert_eq!(value_of(&container, "b"), 5.0);
}

#[test]
fn test_no_stale_dependency_values() {
    // Declared in reverse dependency order
    let mut container = parameters(&[("d", "c + b"), ("c", "b * 2"), ("b", "a + 1"), ("a", "1")]);
    assert_eq!(value_of(&container, "d"), 6.0);

    let a = id_of(&container, "a");
    container.create_or_update("a", "10", Some(a), None, &()).unwrap();
    container.evaluate_all(&());

    assert_eq!(value_of(&container, "b"), 11.0);
    assert_eq!(value_of(&container, "c"), 22.0);
    assert_eq!(value_of(&container, "d"), 33.0);

    // Every entity comes after everything it references
    let order = container.evaluation_order();
    for (position, id) in order.iter().enumerate() {
        let row = container.index_of(*id).unwrap();
        for referenced in container.direct_references(row).unwrap() {
            let referenced_id = container.iter().nth(*referenced).unwrap().id();
            let referenced_position = order.iter().position(|o| *o == referenced_id).unwrap();
            assert!(referenced_position < position);
        }
    }
}

#[test]
fn test_name_collision_and_self_rename() {
    let mut container = parameters(&[("k", "1")]);
    let k = id_of(&container, "k");

    assert!(container.is_disallowed_name(None, "k", &()));
    assert!(container
        .add_object(NamedEntity::parameter("k", "2"), 1, false, &())
        .is_none());
    assert_eq!(container.len(), 1);

    let log = EventLog::new();
    container.add_listener(Box::new(log.clone()));
    let applied = container.rename(k, "k", true, &()).unwrap();
    assert_eq!(applied.id, k);
    assert!(applied.edit.is_none());
    assert!(log.is_empty());
}

#[test]
fn test_broken_expression_only_affects_dependents() {
    let mut container = parameters(&[("a", "1"), ("b", "a + 1"), ("c", "3")]);
    let a = id_of(&container, "a");
    let a = container.set_expression(a, "sqrt(-1)", false).unwrap().id;
    container.evaluate_all(&());

    assert!(!container.is_invalid_expression(a));
    assert!(value_of(&container, "a").is_nan());
    assert!(value_of(&container, "b").is_nan());
    assert_eq!(container.state(id_of(&container, "b")), Some(EntityState::Invalid));
    assert_eq!(value_of(&container, "c"), 3.0);
    assert_eq!(container.state(id_of(&container, "c")), Some(EntityState::Valid));
}

#[test]
fn test_unparsable_input_is_kept_pending() {
    let mut container = parameters(&[("a", "4")]);
    let a = id_of(&container, "a");
    let a = container.set_expression(a, "4 *", false).unwrap().id;

    let entity = container.get(a).unwrap();
    assert_eq!(entity.input(), "4 *");
    assert_eq!(entity.expression(), "4");
    assert!(container.is_invalid_expression(a));

    let a = container.set_expression(a, "5", false).unwrap().id;
    assert!(!container.is_invalid_expression(a));
}

#[test]
fn test_uninitialized_until_evaluated() {
    let mut container = Container::parameters();
    let a = container
        .add_object(NamedEntity::parameter("a", "1"), 0, false, &())
        .unwrap()
        .id;
    assert_eq!(container.state(a), Some(EntityState::Uninitialized));
    container.evaluate_all(&());
    assert_eq!(container.state(a), Some(EntityState::Valid));
}

#[test]
fn test_proposed_expression_preview() {
    let container = parameters(&[("a", "1"), ("b", "a + 1"), ("c", "b * 3"), ("z", "9")]);
    let seed = container
        .get_by_name("a")
        .unwrap()
        .with_proposed_expression("5");

    let preview = container.evaluate_dependents(&seed, &());
    let values: Vec<(&str, f64)> = preview.iter().map(|e| (e.name(), e.value())).collect();
    assert_eq!(values, vec![("b", 6.0), ("c", 18.0)]);
    assert_eq!(value_of(&container, "c"), 6.0);
}

#[test]
fn test_function_variables_are_positional() {
    let params = parameters(&[("amp", "2")]);
    let mut functions = Container::functions(&["x", "y"]);
    let f = functions
        .add_object(NamedEntity::function("f", "amp * x - y"), 0, false, &params)
        .unwrap()
        .id;
    functions.evaluate_all(&params);

    assert_eq!(functions.evaluate_at(f, &[3.0, 1.0], &params), 5.0);
    assert_eq!(functions.evaluate_at(f, &[1.0, 3.0], &params), -1.0);
}

#[test]
fn test_insert_keeps_dependency_graph_current() {
    let mut container = parameters(&[("a", "1"), ("b", "a * 10")]);
    container
        .add_object(NamedEntity::parameter("z", "0"), 0, false, &())
        .unwrap();

    // Rows shifted by the insert: b is now at row 2 and references a at row 1
    let b_row = container.index_of(id_of(&container, "b")).unwrap();
    assert_eq!(b_row, 2);
    assert_eq!(
        container.direct_references(b_row).unwrap().iter().copied().collect::<Vec<_>>(),
        vec![1]
    );

    let seed = container
        .get_by_name("a")
        .unwrap()
        .with_proposed_expression("2");
    let preview = container.evaluate_dependents(&seed, &());
    let names: Vec<&str> = preview.iter().map(NamedEntity::name).collect();
    assert_eq!(names, vec!["b"]);
    assert_eq!(preview[0].value(), 20.0);
}

#[test]
fn test_remove_keeps_dependency_graph_current() {
    let mut container = parameters(&[("z", "0"), ("a", "1"), ("b", "a + 1")]);
    let z = id_of(&container, "z");
    container.remove_object(z, false).unwrap();

    assert_eq!(container.direct_references(1).unwrap().iter().copied().collect::<Vec<_>>(), vec![0]);
    assert!(!container.evaluation_order().contains(&z));
    assert_eq!(container.evaluation_order().len(), 2);
}

#[test]
fn test_unparsable_input_invalidates_dependents() {
    let mut container = parameters(&[("a", "1"), ("b", "a * 2"), ("c", "b + 1"), ("d", "4")]);
    let a = id_of(&container, "a");
    let a = container.set_expression(a, "1 +", false).unwrap().id;
    container.evaluate_all(&());

    assert_eq!(container.state(a), Some(EntityState::Invalid));
    for name in ["b", "c"] {
        let id = id_of(&container, name);
        assert_eq!(container.state(id), Some(EntityState::Invalid));
        assert!(value_of(&container, name).is_nan());
        assert!(!container.evaluation_order().contains(&id));
    }
    assert_eq!(container.state(id_of(&container, "d")), Some(EntityState::Valid));

    // Fixing the input brings the dependents back
    container.set_expression(a, "3", false).unwrap();
    container.evaluate_all(&());
    assert_eq!(value_of(&container, "c"), 7.0);
    assert_eq!(container.state(id_of(&container, "c")), Some(EntityState::Valid));
}
