//! Scalar convergence-rate estimation over a whole series pair.
//!
//! In the asymptotic regime the error between two series behaves like
//! `epsilon[n + 1] = c * epsilon[n]^iota`. Taking logs twice turns the
//! successive log-error differences into a line whose slope is `ln(iota)`:
//!
//! 1. `epsilon[k] = |series_1[k] - series_2[k]|`
//! 2. `y[k] = ln |ln epsilon[k + 1] - ln epsilon[k]|`
//! 3. least-squares fit of `y` against `k`
//! 4. `iota = exp(slope)`, `c = epsilon[n - 1] / epsilon[n - 2]^iota`

use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{ConvergenceError, DegeneracyKind, Result};
use crate::fit::fit_line;
use crate::options::MIN_WINDOW;
use crate::series::SeriesPair;

/// Convergence rate `iota` and asymptotic constant `c` of an error series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    /// Asymptotic order of convergence (`iota`).
    pub rate: f64,
    /// Asymptotic error ratio (`c`).
    pub constant: f64,
}

/// Estimates how fast one series converges toward another.
#[derive(Clone, Debug)]
pub struct ConvergenceEstimator {
    pair: SeriesPair,
}

impl ConvergenceEstimator {
    /// Wraps a validated series pair.
    pub fn new(pair: SeriesPair) -> Self {
        Self { pair }
    }

    /// Accessor for the underlying series pair.
    pub fn pair(&self) -> &SeriesPair {
        &self.pair
    }

    /// Estimates the convergence rate over the full series.
    pub fn estimate(&self) -> Result<ConvergenceResult> {
        estimate_errors(self.pair.errors().as_slice())
    }

    /// Estimates the convergence rate over the first `window` checkpoints.
    pub fn estimate_window(&self, window: usize) -> Result<ConvergenceResult> {
        if window > self.pair.len() {
            return Err(ConvergenceError::shape_mismatch(
                "window length",
                self.pair.len(),
                window,
            ));
        }
        estimate_errors(&self.pair.errors().as_slice()[..window])
    }
}

/// Estimates `(rate, constant)` for `series_1` converging toward `series_2`.
///
/// Fails with [`ConvergenceError::ShapeMismatch`] when the lengths differ or are below
/// four, and with [`ConvergenceError::DegenerateSeries`] when an error term is zero or
/// two consecutive errors are equal.
pub fn estimate_convergence(series_1: &[f64], series_2: &[f64]) -> Result<ConvergenceResult> {
    let pair = SeriesPair::from_slices(series_1, series_2)?;
    ConvergenceEstimator::new(pair).estimate()
}

/// Core estimate on a precomputed absolute-error series.
pub(crate) fn estimate_errors(errors: &[f64]) -> Result<ConvergenceResult> {
    let length = errors.len();
    if length < MIN_WINDOW {
        return Err(ConvergenceError::shape_mismatch(
            "window length",
            MIN_WINDOW,
            length,
        ));
    }

    let log_errors = log_errors(errors)?;

    // A zero difference is reported against the later checkpoint of the pair.
    let mut y = DVector::zeros(length - 1);
    for k in 0..length - 1 {
        let difference = log_errors[k + 1] - log_errors[k];
        if difference == 0.0 {
            return Err(ConvergenceError::degenerate(
                k + 1,
                length,
                DegeneracyKind::StalledLogDifference,
            ));
        }
        y[k] = difference.abs().ln();
    }
    let x = DVector::from_fn(length - 1, |k, _| k as f64);

    let fit = fit_line(&x, &y)?;
    let result = from_slope(fit.slope, errors[length - 1], errors[length - 2])?;

    debug!(
        "convergence estimate over {} checkpoints: rate {:.6e}, constant {:.6e}",
        length, result.rate, result.constant
    );
    Ok(result)
}

/// Converts the fitted log-log slope into `(rate, constant)` for a window whose last two
/// errors are `previous` and `last`.
pub(crate) fn from_slope(slope: f64, last: f64, previous: f64) -> Result<ConvergenceResult> {
    let rate = slope.exp();
    if !rate.is_finite() {
        return Err(ConvergenceError::numerical("convergence rate"));
    }
    let constant = last / previous.powf(rate);
    if !constant.is_finite() {
        return Err(ConvergenceError::numerical("convergence constant"));
    }
    Ok(ConvergenceResult { rate, constant })
}

fn log_errors(errors: &[f64]) -> Result<Vec<f64>> {
    let length = errors.len();
    errors
        .iter()
        .enumerate()
        .map(|(index, &error)| {
            if !error.is_finite() {
                Err(ConvergenceError::degenerate(
                    index,
                    length,
                    DegeneracyKind::NonFinite,
                ))
            } else if error == 0.0 {
                Err(ConvergenceError::degenerate(
                    index,
                    length,
                    DegeneracyKind::ZeroError,
                ))
            } else {
                Ok(error.ln())
            }
        })
        .collect()
}
