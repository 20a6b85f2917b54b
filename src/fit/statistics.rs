//! Goodness-of-fit statistics over the sample pairs.

/// Pearson statistics of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Squared correlation `cov² / (varX · varY)`
    pub correlation: f64,
    /// Slope and intercept standard errors; NaN unless the fit is linear
    pub uncertainties: [f64; 2],
}

impl Statistics {
    fn undefined() -> Self {
        Self {
            correlation: f64::NAN,
            uncertainties: [f64::NAN, f64::NAN],
        }
    }
}

/// Describe the samples. Standard errors are computed only for a `linear` fit.
///
/// Fewer than three points, or zero spread in either axis, leaves everything
/// NaN.
pub fn describe(x: &[f64], y: &[f64], linear: bool) -> Statistics {
    let n = x.len().min(y.len());
    if n < 3 {
        return Statistics::undefined();
    }
    let (x, y) = (&x[..n], &y[..n]);
    let count = n as f64;

    let mean_x = x.iter().sum::<f64>() / count;
    let mean_y = y.iter().sum::<f64>() / count;

    let sum_sq_x: f64 = x.iter().map(|x| (x - mean_x).powi(2)).sum();
    let sum_sq_y: f64 = y.iter().map(|y| (y - mean_y).powi(2)).sum();
    let covariance_sum: f64 = x
        .iter()
        .zip(y)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    if sum_sq_x == 0.0 || sum_sq_y == 0.0 {
        return Statistics::undefined();
    }

    let correlation = covariance_sum.powi(2) / (sum_sq_x * sum_sq_y);

    let uncertainties = if linear {
        let mean_squared_error =
            (sum_sq_y - covariance_sum.powi(2) / sum_sq_x).max(0.0) / (count - 2.0);
        [
            (mean_squared_error / sum_sq_x).sqrt(),
            (mean_squared_error * (1.0 / count + mean_x * mean_x / sum_sq_x)).sqrt(),
        ]
    } else {
        [f64::NAN, f64::NAN]
    };

    Statistics {
        correlation,
        uncertainties,
    }
}
