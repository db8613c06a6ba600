//! Ordinary least-squares fit of a degree-1 polynomial.

use nalgebra::{DMatrix, DVector};

use crate::error::{ConvergenceError, Result};

/// Coefficients of `y = intercept + slope * x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    /// Value of the line at `x = 0`.
    pub intercept: f64,
    /// Leading coefficient.
    pub slope: f64,
}

/// Fits a straight line to `(x[k], y[k])` by minimizing squared residuals.
///
/// The abscissae are centred before the normal equations are formed.
pub fn fit_line(x: &DVector<f64>, y: &DVector<f64>) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(ConvergenceError::shape_mismatch("fit ordinates", x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(ConvergenceError::shape_mismatch("fit points", 2, x.len()));
    }

    let x_mean = x.mean();
    let centred = x.add_scalar(-x_mean);
    if centred.norm_squared() == 0.0 {
        return Err(ConvergenceError::SingularFit);
    }

    let n = x.len();
    let design = DMatrix::from_fn(n, 2, |row, col| if col == 0 { 1.0 } else { centred[row] });
    let design_t = design.transpose();
    let xtx = &design_t * &design;
    let xty = &design_t * y;

    let cholesky = nalgebra::linalg::Cholesky::new(xtx).ok_or(ConvergenceError::SingularFit)?;
    let coefficients = cholesky.solve(&xty);

    let slope = coefficients[1];
    let intercept = coefficients[0] - slope * x_mean;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(ConvergenceError::numerical("line fit"));
    }

    Ok(LinearFit { intercept, slope })
}
