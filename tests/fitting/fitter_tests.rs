use std::cell::Cell;

use approx::assert_relative_eq;
use fitgraph::fit::{
    dev_squared, CurveFitter, Dataset, ExpressionModel, FitConfig, FitModel, FitStrategy,
    FreeParameter, PolynomialModel,
};

fn proportional_data() -> Dataset {
    Dataset::new("prop", vec![0.0, 1.0, 2.0, 3.0], vec![0.1, 0.9, 2.1, 2.9]).unwrap()
}

/// Honest for its first `honest_calls` evaluations, then far off the data
/// wherever the parameter goes.
struct Diverging {
    a: f64,
    calls: Cell<usize>,
    honest_calls: usize,
}

impl FitModel for Diverging {
    fn parameter_count(&self) -> usize {
        1
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.a]
    }

    fn set_parameters(&mut self, values: &[f64]) {
        self.a = values[0];
    }

    fn evaluate(&self, x: f64) -> f64 {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n < self.honest_calls {
            self.a * x
        } else {
            1e3 * (1.0 + (self.a - 5.0).powi(2))
        }
    }
}

#[test]
fn test_fit_never_worse_than_start() {
    let data = proportional_data();
    let fitter = CurveFitter::default();

    for start in [-5.0, 0.0, 0.5, 2.0, 10.0] {
        let mut model =
            ExpressionModel::new("a*x", "x", &[FreeParameter::new("a", start)]).unwrap();
        let report = fitter.fit(&mut model, &data);

        assert!(report.dev_squared <= report.baseline, "start {start}");
        assert_relative_eq!(model.parameters()[0], 13.8 / 14.0, epsilon = 1e-4);
        assert_eq!(report.dev_squared, dev_squared(&model, data.x(), data.y()));
    }
}

#[test]
fn test_linear_regression_is_exact() {
    let data = Dataset::new(
        "line",
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        vec![1.0, 3.0, 5.0, 7.0, 9.0],
    )
    .unwrap();
    let mut line = PolynomialModel::new(vec![0.0, 0.0]);
    let report = CurveFitter::default().fit(&mut line, &data);

    assert_eq!(report.strategy, FitStrategy::ClosedForm);
    assert_relative_eq!(report.correlation, 1.0, epsilon = 1e-12);
    assert_eq!(report.uncertainties, [0.0, 0.0]);
    assert_eq!(line.coefficients(), &[2.0, 1.0]);
    assert_eq!(report.rms_deviation, 0.0);
}

#[test]
fn test_two_points_have_no_statistics() {
    let data = Dataset::new("pair", vec![0.0, 1.0], vec![3.0, -1.0]).unwrap();

    let mut line = PolynomialModel::new(vec![0.0, 0.0]);
    let report = CurveFitter::default().fit(&mut line, &data);
    assert!(report.correlation.is_nan());
    assert!(report.uncertainties.iter().all(|u| u.is_nan()));

    let mut scaled =
        ExpressionModel::new("a*x", "x", &[FreeParameter::new("a", 1.0)]).unwrap();
    let report = CurveFitter::default().fit(&mut scaled, &data);
    assert!(report.correlation.is_nan());
    assert!(report.uncertainties.iter().all(|u| u.is_nan()));
}

#[test]
fn test_rollback_restores_exact_parameters() {
    let data = proportional_data();
    let start = 0.7;
    let mut model = Diverging {
        a: start,
        calls: Cell::new(0),
        honest_calls: 4,
    };
    let baseline: f64 = [0.0_f64, 1.0, 2.0, 3.0]
        .iter()
        .zip([0.1, 0.9, 2.1, 2.9])
        .map(|(x, y)| (start * x - y).powi(2))
        .sum();

    let report = CurveFitter::default().fit(&mut model, &data);

    assert_eq!(model.a, start);
    assert_eq!(report.strategy, FitStrategy::Unchanged);
    assert_eq!(report.baseline, baseline);
    assert_eq!(report.dev_squared, baseline);
    assert_eq!(report.rms_deviation, (baseline / 4.0).sqrt());
}

#[test]
fn test_skips_without_free_parameters() {
    let data = proportional_data();
    let mut model = ExpressionModel::new("x", "x", &[]).unwrap();
    let report = CurveFitter::default().fit(&mut model, &data);

    assert_eq!(report.strategy, FitStrategy::NotOptimized);
    assert_relative_eq!(report.dev_squared, 0.04, epsilon = 1e-12);
    assert!(report.correlation.is_finite());
}

#[test]
fn test_invalid_samples_are_ignored() {
    let data = Dataset::new(
        "gappy",
        vec![0.0, 1.0, f64::NAN, 2.0, 3.0, 100.0],
        vec![1.0, 3.0, 4.0, 5.0, 7.0, 0.0],
    )
    .unwrap()
    .with_valid_len(5);
    let mut line = PolynomialModel::new(vec![1.0, 1.0]);
    let report = CurveFitter::default().fit(&mut line, &data);

    assert_eq!(report.samples, 4);
    assert_relative_eq!(line.coefficients()[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(line.coefficients()[1], 1.0, epsilon = 1e-12);
}

#[test]
fn test_nonlinear_fit_falls_through_to_improvement() {
    let x: Vec<f64> = (0..12).map(|i| f64::from(i) * 0.25).collect();
    let y: Vec<f64> = x.iter().map(|x| 2.0 * (-1.3 * x).exp() + 0.5).collect();
    let data = Dataset::new("decay", x, y).unwrap();
    let mut model = ExpressionModel::new(
        "a*exp(-k*x) + c",
        "x",
        &[
            FreeParameter::new("a", 1.0),
            FreeParameter::new("k", 1.0),
            FreeParameter::new("c", 0.0),
        ],
    )
    .unwrap();

    let fitter = CurveFitter::new(FitConfig::default().with_max_iterations(100));
    let report = fitter.fit(&mut model, &data);

    assert!(report.dev_squared < report.baseline);
    assert!(matches!(
        report.strategy,
        FitStrategy::Hessian | FitStrategy::LevenbergMarquardt
    ));
    assert!(report.uncertainties.iter().all(|u| u.is_nan()));
}
