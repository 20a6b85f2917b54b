//! Curve fitting
//!
//! [`CurveFitter`] fits a [`FitModel`] to the valid samples of a [`Dataset`].
//! Polynomials are solved in closed form; anything else is handed to a Newton
//! minimizer and, failing that, to Levenberg-Marquardt. The accepted
//! parameters are never worse than the starting ones.

pub mod config;
pub mod dataset;
pub mod fitter;
pub mod hessian;
pub mod linalg;
pub mod lm;
pub mod model;
pub mod polynomial;
pub mod problem;
pub mod statistics;

// Re-export key types
pub use config::{FitConfig, LmConfig};
pub use dataset::Dataset;
pub use fitter::{dev_squared, CurveFitter, FitReport, FitStrategy};
pub use hessian::HessianMinimizer;
pub use lm::LevenbergMarquardt;
pub use model::{ExpressionModel, FitForm, FitFunction, FitModel, FreeParameter, PolynomialModel};
pub use problem::{CurveProblem, Minimum, Problem};
pub use statistics::{describe, Statistics};
