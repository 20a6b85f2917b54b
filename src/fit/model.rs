//! Fit functions and the models the fitter optimizes.
//!
//! [`FitFunction`] is the data a fit entity carries: its independent variable,
//! its form, and its ordered free parameters. [`FitModel`] is what the
//! fitter actually works on; [`FitFunction::model`] builds one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::expression::{EvaluationContext, ExprResult, Expression, ExpressionError};
use crate::entities::scope::NameScope;
use crate::error::{FitGraphError, Result};

/// A named optimization target and its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeParameter {
    pub name: String,
    pub value: f64,
}

impl FreeParameter {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Shape of a fit function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitForm {
    /// Polynomial of fixed degree, solved in closed form. Free parameters are
    /// the coefficients, highest power first.
    Polynomial { degree: usize },
    /// Arbitrary expression, solved iteratively.
    Expression,
}

/// Fit data attached to a fit entity.
///
/// Deserialization rejects a polynomial whose degree does not match its
/// coefficient count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FitFunctionFields")]
pub struct FitFunction {
    variable: String,
    form: FitForm,
    free_parameters: Vec<FreeParameter>,
}

/// Unchecked serialized form of [`FitFunction`].
#[derive(Deserialize)]
struct FitFunctionFields {
    variable: String,
    form: FitForm,
    free_parameters: Vec<FreeParameter>,
}

impl TryFrom<FitFunctionFields> for FitFunction {
    type Error = String;

    fn try_from(fields: FitFunctionFields) -> std::result::Result<Self, Self::Error> {
        match fields.form {
            FitForm::Polynomial { degree } if degree + 1 != fields.free_parameters.len() => {
                Err(format!(
                    "polynomial of degree {} needs {} coefficients, got {}",
                    degree,
                    degree + 1,
                    fields.free_parameters.len()
                ))
            }
            form => Ok(Self {
                variable: fields.variable,
                form,
                free_parameters: fields.free_parameters,
            }),
        }
    }
}

impl FitFunction {
    /// An arbitrary-expression fit function.
    pub fn expression(variable: &str, free_parameters: Vec<FreeParameter>) -> Self {
        Self {
            variable: variable.to_string(),
            form: FitForm::Expression,
            free_parameters,
        }
    }

    /// A polynomial whose degree is one less than the number of coefficients.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitgraph::fit::{FitFunction, FreeParameter};
    ///
    /// let line = FitFunction::polynomial(
    ///     "x",
    ///     vec![FreeParameter::new("m", 1.0), FreeParameter::new("b", 0.0)],
    /// )
    /// .unwrap();
    /// assert_eq!(line.polynomial_expression().unwrap(), "m*x + b");
    /// ```
    pub fn polynomial(variable: &str, coefficients: Vec<FreeParameter>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(FitGraphError::InvalidInput(
                "a polynomial needs at least one coefficient".to_string(),
            ));
        }
        Ok(Self {
            variable: variable.to_string(),
            form: FitForm::Polynomial {
                degree: coefficients.len() - 1,
            },
            free_parameters: coefficients,
        })
    }

    /// Name of the independent variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn form(&self) -> FitForm {
        self.form
    }

    /// Free parameters in order; for a polynomial, highest power first.
    pub fn free_parameters(&self) -> &[FreeParameter] {
        &self.free_parameters
    }

    pub fn parameter_count(&self) -> usize {
        self.free_parameters.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.free_parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.free_parameters.iter().map(|p| p.value).collect()
    }

    /// Overwrite parameter values in order; extra values are ignored.
    pub fn set_values(&mut self, values: &[f64]) {
        for (param, value) in self.free_parameters.iter_mut().zip(values) {
            param.value = *value;
        }
    }

    /// Expression text of a polynomial, e.g. `a*x^2 + b*x + c`.
    pub fn polynomial_expression(&self) -> Option<String> {
        let FitForm::Polynomial { .. } = self.form else {
            return None;
        };
        let degree = self.free_parameters.len().checked_sub(1)?;
        let terms: Vec<String> = self
            .free_parameters
            .iter()
            .enumerate()
            .map(|(i, param)| match degree - i {
                0 => param.name.clone(),
                1 => format!("{}*{}", param.name, self.variable),
                power => format!("{}*{}^{}", param.name, self.variable, power),
            })
            .collect();
        Some(terms.join(" + "))
    }

    /// Build the model the fitter optimizes.
    ///
    /// For the expression form, names in `expression` other than the variable
    /// and the free parameters are bound to their current values in `scope`.
    pub fn model(&self, expression: &str, scope: &dyn NameScope) -> Result<Box<dyn FitModel>> {
        match self.form {
            FitForm::Polynomial { .. } => Ok(Box::new(PolynomialModel::new(self.values()))),
            FitForm::Expression => {
                let mut model =
                    ExpressionModel::new(expression, &self.variable, &self.free_parameters)?;
                for name in model.expression.variables() {
                    if name == self.variable || model.names.contains(&name) {
                        continue;
                    }
                    if let Some(value) = scope.value_of(&name) {
                        model.fixed.insert(name, value);
                    }
                }
                Ok(Box::new(model))
            }
        }
    }
}

/// A function of one variable with adjustable parameters.
pub trait FitModel {
    /// Number of free parameters.
    fn parameter_count(&self) -> usize;

    /// Current parameter values, in order.
    fn parameters(&self) -> Vec<f64>;

    /// Overwrite the parameter values, in order.
    fn set_parameters(&mut self, values: &[f64]);

    /// Value at `x`; NaN when the function cannot be evaluated there.
    fn evaluate(&self, x: f64) -> f64;

    /// Degree, if this model is a polynomial that can be solved in closed form.
    fn polynomial_degree(&self) -> Option<usize> {
        None
    }
}

/// Polynomial with coefficients stored highest power first.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialModel {
    coefficients: Vec<f64>,
}

impl PolynomialModel {
    /// Creates a polynomial from coefficients, highest power first.
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl FitModel for PolynomialModel {
    fn parameter_count(&self) -> usize {
        self.coefficients.len()
    }

    fn parameters(&self) -> Vec<f64> {
        self.coefficients.clone()
    }

    fn set_parameters(&mut self, values: &[f64]) {
        for (c, v) in self.coefficients.iter_mut().zip(values) {
            *c = *v;
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        // Horner's rule
        self.coefficients.iter().fold(0.0, |acc, c| acc * x + c)
    }

    fn polynomial_degree(&self) -> Option<usize> {
        self.coefficients.len().checked_sub(1)
    }
}

/// User-authored expression of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionModel {
    expression: Expression,
    variable: String,
    names: Vec<String>,
    values: Vec<f64>,
    /// Names that are neither the variable nor free parameters
    fixed: HashMap<String, f64>,
}

struct ModelContext<'a> {
    model: &'a ExpressionModel,
    x: f64,
}

impl EvaluationContext for ModelContext<'_> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        if name == self.model.variable {
            return Ok(self.x);
        }
        if let Some(i) = self.model.names.iter().position(|n| n == name) {
            return Ok(self.model.values[i]);
        }
        self.model
            .fixed
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        name == self.model.variable
            || self.model.names.iter().any(|n| n == name)
            || self.model.fixed.contains_key(name)
    }
}

impl ExpressionModel {
    /// Parse `expression` as a function of `variable` with the given free
    /// parameters.
    ///
    /// # Errors
    ///
    /// * [`FitGraphError::Expression`] if the expression does not parse
    pub fn new(expression: &str, variable: &str, parameters: &[FreeParameter]) -> Result<Self> {
        Ok(Self {
            expression: Expression::parse(expression)?,
            variable: variable.to_string(),
            names: parameters.iter().map(|p| p.name.clone()).collect(),
            values: parameters.iter().map(|p| p.value).collect(),
            fixed: HashMap::new(),
        })
    }

    /// Bind a name that is not optimized.
    pub fn with_fixed(mut self, name: &str, value: f64) -> Self {
        self.fixed.insert(name.to_string(), value);
        self
    }
}

impl FitModel for ExpressionModel {
    fn parameter_count(&self) -> usize {
        self.values.len()
    }

    fn parameters(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn set_parameters(&mut self, values: &[f64]) {
        for (slot, v) in self.values.iter_mut().zip(values) {
            *slot = *v;
        }
    }

    fn evaluate(&self, x: f64) -> f64 {
        self.expression
            .evaluate(&ModelContext { model: self, x })
            .unwrap_or(f64::NAN)
    }
}
