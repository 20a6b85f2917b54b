use approx::assert_relative_eq;
use fitgraph::fit::{
    CurveProblem, ExpressionModel, FitConfig, FreeParameter, HessianMinimizer, LevenbergMarquardt,
    LmConfig, Problem,
};
use ndarray::array;

fn gaussian_samples() -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..21).map(|i| -2.0 + f64::from(i) * 0.2).collect();
    let y = x
        .iter()
        .map(|x| 3.0 * (-(x - 0.4_f64).powi(2) / (2.0 * 0.5_f64.powi(2))).exp())
        .collect();
    (x, y)
}

fn gaussian_model() -> ExpressionModel {
    ExpressionModel::new(
        "amp * exp(-(x - mu)^2 / (2 * sigma^2))",
        "x",
        &[
            FreeParameter::new("amp", 2.0),
            FreeParameter::new("mu", 0.0),
            FreeParameter::new("sigma", 0.8),
        ],
    )
    .unwrap()
}

#[test]
fn test_levenberg_marquardt_gaussian_peak() {
    let (x, y) = gaussian_samples();
    let mut model = gaussian_model();
    let problem = CurveProblem::new(&mut model, &x, &y);

    let lm = LevenbergMarquardt::new(FitConfig::default().with_max_iterations(200));
    let result = lm.minimize(&problem, array![2.0, 0.0, 0.8]).unwrap();

    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-3);
    assert_relative_eq!(result.params[1], 0.4, epsilon = 1e-3);
    assert_relative_eq!(result.params[2].abs(), 0.5, epsilon = 1e-3);
}

#[test]
fn test_minimizers_respect_iteration_budget() {
    let (x, y) = gaussian_samples();
    let config = FitConfig::default().with_max_iterations(3);

    let mut model = gaussian_model();
    let problem = CurveProblem::new(&mut model, &x, &y);
    let start = array![2.0, 0.0, 0.8];
    let start_cost = problem.eval_cost(&start).unwrap();

    let newton = HessianMinimizer::new(config.clone())
        .minimize(&problem, start.clone())
        .unwrap();
    assert!(newton.iterations <= 3);
    assert!(newton.cost <= start_cost);

    let lm = LevenbergMarquardt::new(config).minimize(&problem, start).unwrap();
    assert!(lm.iterations <= 3);
    assert!(lm.cost <= start_cost);
}

#[test]
fn test_heavy_damping_still_descends() {
    let x = [0.0, 1.0, 2.0, 3.0];
    let y = [0.1, 0.9, 2.1, 2.9];
    let mut model = ExpressionModel::new("a*x", "x", &[FreeParameter::new("a", 4.0)]).unwrap();
    let problem = CurveProblem::new(&mut model, &x, &y);

    let config = FitConfig::default().with_lm(LmConfig {
        initial_lambda: 1e3,
        ..LmConfig::default()
    });
    let start_cost = problem.eval_cost(&array![4.0]).unwrap();
    let result = LevenbergMarquardt::new(config)
        .minimize(&problem, array![4.0])
        .unwrap();
    assert!(result.cost < start_cost);
}
