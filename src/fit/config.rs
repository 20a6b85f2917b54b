//! Configuration options for the curve fitter.
//!
//! The defaults reproduce the fitter's fixed budget: 20 iterations per
//! minimizer and a 1e-6 convergence tolerance.

/// Damping schedule of the Levenberg-Marquardt minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct LmConfig {
    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda after a rejected step. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda after an accepted step. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
        }
    }
}

/// Configuration of a [`CurveFitter`](crate::fit::CurveFitter).
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    /// Iteration budget of each minimizer. Default: 20
    pub max_iterations: usize,

    /// Relative tolerance on parameter and cost change. Default: 1e-6
    pub tolerance: f64,

    /// Relative step for finite differences. Default: 1e-5
    pub finite_difference_step: f64,

    /// Levenberg-Marquardt damping schedule.
    pub lm: LmConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-6,
            finite_difference_step: 1e-5,
            lm: LmConfig::default(),
        }
    }
}

impl FitConfig {
    /// Set the iteration budget of each minimizer.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative finite difference step.
    pub fn with_finite_difference_step(mut self, step: f64) -> Self {
        self.finite_difference_step = step;
        self
    }

    /// Replace the Levenberg-Marquardt damping schedule.
    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }
}
