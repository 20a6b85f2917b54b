//! The curve fitter.
//!
//! A fit never ends worse than where it started: the accepted parameters are
//! the best of the closed-form or minimizer candidates and the starting
//! point, measured by the sum of squared deviations over the valid samples.

use std::fmt;

use ndarray::Array1;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fit::config::FitConfig;
use crate::fit::dataset::Dataset;
use crate::fit::hessian::HessianMinimizer;
use crate::fit::lm::LevenbergMarquardt;
use crate::fit::model::FitModel;
use crate::fit::polynomial::fit_polynomial;
use crate::fit::problem::{CurveProblem, Minimum};
use crate::fit::statistics::describe;

/// Which candidate a fit kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStrategy {
    /// Closed-form polynomial least squares
    ClosedForm,
    /// Newton minimizer on the cost Hessian
    Hessian,
    /// Levenberg-Marquardt fallback
    LevenbergMarquardt,
    /// Optimization ran but nothing improved on the starting parameters
    Unchanged,
    /// Optimization was skipped (non-finite baseline, no free parameters,
    /// or fewer samples than parameters)
    NotOptimized,
}

impl fmt::Display for FitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitStrategy::ClosedForm => "closed form",
            FitStrategy::Hessian => "hessian",
            FitStrategy::LevenbergMarquardt => "levenberg-marquardt",
            FitStrategy::Unchanged => "unchanged",
            FitStrategy::NotOptimized => "not optimized",
        };
        f.write_str(name)
    }
}

/// Result of [`CurveFitter::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// `sqrt(dev_squared / n)`
    pub rms_deviation: f64,

    /// Sum of squared deviations of the accepted parameters
    pub dev_squared: f64,

    /// Sum of squared deviations of the starting parameters
    pub baseline: f64,

    /// Squared Pearson correlation of the samples
    pub correlation: f64,

    /// Slope and intercept standard errors (linear fits only)
    pub uncertainties: [f64; 2],

    /// Which candidate was accepted
    pub strategy: FitStrategy,

    /// Number of valid samples
    pub samples: usize,
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Strategy: {}", self.strategy)?;
        writeln!(f, "  Samples: {}", self.samples)?;
        writeln!(f, "  RMS deviation: {:.6e}", self.rms_deviation)?;
        writeln!(
            f,
            "  Deviation squared: {:.6e} (baseline {:.6e})",
            self.dev_squared, self.baseline
        )?;
        writeln!(f, "  Correlation: {:.6}", self.correlation)?;
        writeln!(
            f,
            "  Uncertainties: slope {:.6e}, intercept {:.6e}",
            self.uncertainties[0], self.uncertainties[1]
        )?;
        Ok(())
    }
}

/// Fits a [`FitModel`] to a [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct CurveFitter {
    config: FitConfig,
}

impl CurveFitter {
    /// Creates a fitter with the given minimizer configuration.
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit `model` to the valid samples of `dataset`.
    ///
    /// The model's parameters are left at the accepted solution. Failure to
    /// improve is not an error: the report then carries the baseline.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitgraph::fit::{CurveFitter, Dataset, FitStrategy, PolynomialModel};
    ///
    /// let data = Dataset::new("line", vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 3.0, 5.0, 7.0]).unwrap();
    /// let mut line = PolynomialModel::new(vec![0.0, 0.0]);
    /// let report = CurveFitter::default().fit(&mut line, &data);
    ///
    /// assert_eq!(report.strategy, FitStrategy::ClosedForm);
    /// assert_eq!(line.coefficients(), &[2.0, 1.0]);
    /// assert_eq!(report.rms_deviation, 0.0);
    /// ```
    pub fn fit(&self, model: &mut dyn FitModel, dataset: &Dataset) -> FitReport {
        let (x, y) = dataset.valid_points();
        let n = x.len();
        let baseline = dev_squared(model, &x, &y);
        let mut linear = false;

        let (dev_sq, strategy) = if baseline.is_nan() {
            debug!(dataset = dataset.name(), "non-finite baseline, skipping optimization");
            (baseline, FitStrategy::NotOptimized)
        } else if let Some(degree) = model.polynomial_degree() {
            linear = degree == 1;
            self.closed_form(model, &x, &y, degree, baseline)
        } else if model.parameter_count() >= 1 && n >= model.parameter_count() {
            self.minimize(model, &x, &y, baseline)
        } else {
            debug!(
                parameters = model.parameter_count(),
                samples = n,
                "too few samples for the free parameters, skipping optimization"
            );
            (baseline, FitStrategy::NotOptimized)
        };

        let statistics = describe(&x, &y, linear);
        let report = FitReport {
            rms_deviation: (dev_sq / n as f64).sqrt(),
            dev_squared: dev_sq,
            baseline,
            correlation: statistics.correlation,
            uncertainties: statistics.uncertainties,
            strategy,
            samples: n,
        };
        debug!(
            dataset = dataset.name(),
            strategy = %report.strategy,
            rms = report.rms_deviation,
            "fit finished"
        );
        report
    }

    fn closed_form(
        &self,
        model: &mut dyn FitModel,
        x: &[f64],
        y: &[f64],
        degree: usize,
        baseline: f64,
    ) -> (f64, FitStrategy) {
        let previous = model.parameters();
        match fit_polynomial(x, y, degree) {
            Ok(coefficients) => {
                model.set_parameters(&coefficients);
                let dev_sq = dev_squared(model, x, y);
                if dev_sq.is_finite() {
                    (dev_sq, FitStrategy::ClosedForm)
                } else {
                    model.set_parameters(&previous);
                    (baseline, FitStrategy::Unchanged)
                }
            }
            Err(err) => {
                debug!(degree, error = %err, "closed-form polynomial fit failed");
                (baseline, FitStrategy::Unchanged)
            }
        }
    }

    fn minimize(
        &self,
        model: &mut dyn FitModel,
        x: &[f64],
        y: &[f64],
        baseline: f64,
    ) -> (f64, FitStrategy) {
        let previous = model.parameters();

        for strategy in [FitStrategy::Hessian, FitStrategy::LevenbergMarquardt] {
            let dev_sq = self.run_stage(model, x, y, &previous, strategy);
            // NaN counts as worse; a stage that never moved falls through
            if dev_sq <= baseline && model.parameters() != previous {
                return (dev_sq, strategy);
            }
            debug!(%strategy, dev_sq, baseline, "no improvement on baseline, restoring");
            model.set_parameters(&previous);
        }

        (baseline, FitStrategy::Unchanged)
    }

    /// Run one minimizer from `start`, leave its result in the model, and
    /// return the resulting squared deviation.
    fn run_stage(
        &self,
        model: &mut dyn FitModel,
        x: &[f64],
        y: &[f64],
        start: &[f64],
        strategy: FitStrategy,
    ) -> f64 {
        let result: Result<Minimum> = {
            let problem = CurveProblem::new(&mut *model, x, y);
            let initial = Array1::from(start.to_vec());
            match strategy {
                FitStrategy::Hessian => {
                    HessianMinimizer::new(self.config.clone()).minimize(&problem, initial)
                }
                _ => LevenbergMarquardt::new(self.config.clone()).minimize(&problem, initial),
            }
        };

        match result {
            Ok(minimum) => {
                debug!(%strategy, %minimum, "minimizer finished");
                model.set_parameters(&minimum.params.to_vec());
                dev_squared(model, x, y)
            }
            Err(err) => {
                warn!(%strategy, error = %err, "minimizer failed");
                model.set_parameters(start);
                f64::NAN
            }
        }
    }
}

/// Sum of squared deviations of `model` over the samples.
pub fn dev_squared(model: &dyn FitModel, x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(x, y)| (model.evaluate(*x) - y).powi(2))
        .sum()
}
