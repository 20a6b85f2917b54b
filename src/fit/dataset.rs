//! Sampled datasets
//!
//! A [`Dataset`] is two columns of samples. Only the first `valid_len` rows
//! are filled; of those, only rows where both values are finite are used for
//! fitting.

use crate::entities::scope::NameScope;
use crate::error::{FitGraphError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    x_name: String,
    y_name: String,
    x: Vec<f64>,
    y: Vec<f64>,
    valid_len: usize,
}

impl Dataset {
    /// Create a dataset with default column names `x` and `y`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitgraph::fit::Dataset;
    ///
    /// let data = Dataset::new("run", vec![0.0, 1.0, f64::NAN], vec![1.0, 2.0, 3.0]).unwrap();
    /// let (x, y) = data.valid_points();
    /// assert_eq!(x, vec![0.0, 1.0]);
    /// assert_eq!(y, vec![1.0, 2.0]);
    /// ```
    pub fn new(name: &str, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        Self::with_columns(name, "x", "y", x, y)
    }

    /// Create a dataset with named columns.
    pub fn with_columns(
        name: &str,
        x_name: &str,
        y_name: &str,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FitGraphError::DimensionMismatch(format!(
                "x has {} samples, y has {}",
                x.len(),
                y.len()
            )));
        }
        let valid_len = x.len();
        Ok(Self {
            name: name.to_string(),
            x_name: x_name.to_string(),
            y_name: y_name.to_string(),
            x,
            y,
            valid_len,
        })
    }

    /// Limit the rows considered filled. Clamped to the column length.
    pub fn with_valid_len(mut self, valid_len: usize) -> Self {
        self.valid_len = valid_len.min(self.x.len());
        self
    }

    /// Dataset name, used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn x_name(&self) -> &str {
        &self.x_name
    }

    pub fn y_name(&self) -> &str {
        &self.y_name
    }

    /// Every x sample, including unfilled and non-finite rows.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of filled rows.
    pub fn valid_len(&self) -> usize {
        self.valid_len
    }

    /// The x and y column names.
    pub fn column_names(&self) -> [&str; 2] {
        [self.x_name.as_str(), self.y_name.as_str()]
    }

    /// Filled rows where both values are finite.
    pub fn valid_points(&self) -> (Vec<f64>, Vec<f64>) {
        self.x[..self.valid_len]
            .iter()
            .zip(&self.y[..self.valid_len])
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .unzip()
    }
}

/// Column names are reserved in function containers backed by the dataset.
impl NameScope for Dataset {
    fn contains_name(&self, name: &str) -> bool {
        self.x_name == name || self.y_name == name
    }

    fn value_of(&self, _name: &str) -> Option<f64> {
        None
    }

    fn scope_names(&self) -> Vec<String> {
        vec![self.x_name.clone(), self.y_name.clone()]
    }
}
