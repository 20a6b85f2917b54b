use approx::assert_relative_eq;
use fitgraph::entities::{EntityState, EventLog, NamedEntity};
use fitgraph::fit::{Dataset, FitFunction, FitStrategy, FreeParameter};
use fitgraph::{FitGraphError, Workspace};

#[test]
fn test_name_taken_anywhere_in_linked_set() {
    let mut ws = Workspace::new();
    let params = ws.add_parameters();
    let funcs = ws.add_functions(params, &["x"]).unwrap();
    let k = ws
        .add_object(params, NamedEntity::parameter("k", "1.5"), 0, false)
        .unwrap()
        .unwrap()
        .id;

    // Neither a function nor a second parameter may be called "k"
    assert!(ws.is_disallowed_name(funcs, None, "k").unwrap());
    assert!(ws.is_disallowed_name(params, None, "k").unwrap());
    assert_eq!(
        ws.create_or_update(funcs, "k", "x", None, None).unwrap(),
        None
    );
    assert_eq!(
        ws.create_or_update(params, "k", "2", None, None).unwrap(),
        None
    );

    // Renaming "k" to itself is a silent no-op
    let log = EventLog::new();
    ws.container_mut(params)
        .unwrap()
        .add_listener(Box::new(log.clone()));
    let applied = ws.rename(params, k, "k", true).unwrap().unwrap();
    assert_eq!(applied.id, k);
    assert!(log.is_empty());
    assert!(!ws.is_disallowed_name(params, Some(k), "k").unwrap());
}

#[test]
fn test_parameter_edits_propagate_to_functions() {
    let mut ws = Workspace::new();
    let params = ws.add_parameters();
    let funcs = ws.add_functions(params, &["x"]).unwrap();
    let slope = ws
        .add_object(params, NamedEntity::parameter("slope", "2"), 0, false)
        .unwrap()
        .unwrap()
        .id;
    let f = ws
        .add_object(funcs, NamedEntity::function("f", "slope * x"), 0, false)
        .unwrap()
        .unwrap()
        .id;
    ws.container_mut(funcs).unwrap().set_variable_values(&[4.0]);
    ws.evaluate_all().unwrap();
    assert_eq!(ws.container(funcs).unwrap().get(f).unwrap().value(), 8.0);

    ws.set_expression(params, slope, "3", false).unwrap().unwrap();
    ws.evaluate_all().unwrap();
    assert_eq!(ws.container(funcs).unwrap().get(f).unwrap().value(), 12.0);
}

#[test]
fn test_layered_parameters_strictly_additive() {
    let mut ws = Workspace::new();
    let base = ws.add_parameters();
    ws.add_object(base, NamedEntity::parameter("scale", "10"), 0, false)
        .unwrap()
        .unwrap();
    ws.add_object(base, NamedEntity::parameter("index", "1"), 1, false)
        .unwrap()
        .unwrap();
    let layer = ws.add_layered_parameters(base, "index").unwrap();
    let funcs = ws.add_functions(layer, &["x"]).unwrap();

    // The layer cannot shadow, the base cannot take the layer's names back
    assert!(ws
        .add_object(layer, NamedEntity::parameter("scale", "1"), 0, false)
        .unwrap()
        .is_none());
    let offset = ws
        .add_object(layer, NamedEntity::parameter("offset", "scale / 2"), 0, false)
        .unwrap()
        .unwrap()
        .id;
    assert!(ws.is_disallowed_name(base, None, "offset").unwrap());

    let f = ws
        .add_object(funcs, NamedEntity::function("f", "scale * x + offset"), 0, false)
        .unwrap()
        .unwrap()
        .id;
    let g = ws
        .add_object(funcs, NamedEntity::function("g", "index"), 1, false)
        .unwrap()
        .unwrap()
        .id;
    ws.evaluate_all().unwrap();

    assert_eq!(ws.container(layer).unwrap().get(offset).unwrap().value(), 5.0);
    assert_eq!(ws.evaluate_at(funcs, f, &[2.0]).unwrap(), 25.0);
    // The excluded name is not visible through the layer
    assert_eq!(
        ws.container(funcs).unwrap().state(g),
        Some(EntityState::Invalid)
    );
    assert!(ws.add_layered_parameters(funcs, "x").is_err());
}

#[test]
fn test_polynomial_fit_round_trip() {
    let mut ws = Workspace::new();
    let params = ws.add_parameters();
    let funcs = ws.add_functions(params, &["t"]).unwrap();
    let data = ws.add_dataset(
        Dataset::with_columns(
            "trajectory",
            "time",
            "height",
            vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5],
            vec![1.0, 3.775, 4.1, 1.975, -2.6, -9.625],
        )
        .unwrap(),
    );
    ws.attach_dataset(funcs, data).unwrap();

    let quadratic = FitFunction::polynomial(
        "t",
        vec![
            FreeParameter::new("a", 0.0),
            FreeParameter::new("b", 0.0),
            FreeParameter::new("c", 0.0),
        ],
    )
    .unwrap();
    let expression = quadratic.polynomial_expression().unwrap();
    let fit = ws
        .add_object(funcs, NamedEntity::fit("h", &expression, quadratic), 0, false)
        .unwrap()
        .unwrap()
        .id;

    // Column names are reserved in the backed container
    assert!(ws.is_disallowed_name(funcs, None, "height").unwrap());

    let report = ws.fit(funcs, fit, None).unwrap();
    assert_eq!(report.strategy, FitStrategy::ClosedForm);
    assert!(report.rms_deviation < 1e-9);

    // Missing parameters are created from the fitted values
    let params_container = ws.container(params).unwrap();
    assert_relative_eq!(
        params_container.get_by_name("a").unwrap().value(),
        -4.9,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        params_container.get_by_name("b").unwrap().value(),
        8.0,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        params_container.get_by_name("c").unwrap().value(),
        1.0,
        epsilon = 1e-9
    );
    assert_relative_eq!(ws.evaluate_at(funcs, fit, &[1.0]).unwrap(), 4.1, epsilon = 1e-9);
}

#[test]
fn test_fit_uses_parameter_container_start_and_scope() {
    let mut ws = Workspace::new();
    let params = ws.add_parameters();
    let funcs = ws.add_functions(params, &["x"]).unwrap();
    ws.add_object(params, NamedEntity::parameter("base", "0.5"), 0, false)
        .unwrap()
        .unwrap();
    let rate = ws
        .add_object(params, NamedEntity::parameter("rate", "0.2"), 1, false)
        .unwrap()
        .unwrap()
        .id;
    let fit_function = FitFunction::expression("x", vec![FreeParameter::new("rate", 5.0)]);
    let growth = ws
        .add_object(
            funcs,
            NamedEntity::fit("growth", "base + rate * x", fit_function),
            0,
            false,
        )
        .unwrap()
        .unwrap()
        .id;
    let data = ws.add_dataset(
        Dataset::new("d", vec![0.0, 1.0, 2.0, 3.0], vec![0.5, 1.5, 2.5, 3.5]).unwrap(),
    );
    ws.evaluate_all().unwrap();

    let report = ws.fit(funcs, growth, Some(data)).unwrap();
    // Started from the container's 0.2, not the stored 5.0
    assert_relative_eq!(report.baseline, 0.64 + 2.56 + 5.76, epsilon = 1e-12);
    assert!(report.rms_deviation < 1e-6);

    let params_container = ws.container(params).unwrap();
    let fitted = params_container.get_by_name("rate").unwrap();
    assert_ne!(fitted.id(), rate);
    assert_relative_eq!(fitted.value(), 1.0, epsilon = 1e-6);
    assert_eq!(params_container.get_by_name("base").unwrap().value(), 0.5);
}

#[test]
fn test_fit_rejects_unparsable_fit_expression() {
    let mut ws = Workspace::new();
    let params = ws.add_parameters();
    let funcs = ws.add_functions(params, &["x"]).unwrap();
    let fit_function = FitFunction::expression("x", vec![FreeParameter::new("a", 1.0)]);
    let f = ws
        .add_object(funcs, NamedEntity::fit("f", "a*x", fit_function), 0, false)
        .unwrap()
        .unwrap()
        .id;
    ws.set_expression(funcs, f, "a*", false).unwrap().unwrap();
    let data = ws.add_dataset(Dataset::new("d", vec![1.0, 2.0], vec![1.0, 2.0]).unwrap());

    assert!(matches!(
        ws.fit(funcs, f, Some(data)),
        Err(FitGraphError::FunctionEvaluation(_))
    ));
}
