//! Aligned series pairs and checkpoint-spacing helpers.

use nalgebra::DVector;
use serde::Serialize;

use crate::error::{ConvergenceError, Result};
use crate::options::MIN_WINDOW;

/// Two aligned series sampled at the same checkpoints, one converging toward the other.
///
/// Construction checks lengths only. Zero or non-finite errors are reported later by the
/// estimator, per window, with the offending index.
#[derive(Clone, Debug, Serialize)]
pub struct SeriesPair {
    errors: DVector<f64>,
}

impl SeriesPair {
    /// Pairs two series after validating that they are aligned and long enough.
    pub fn new(series_1: DVector<f64>, series_2: DVector<f64>) -> Result<Self> {
        if series_1.len() != series_2.len() {
            return Err(ConvergenceError::shape_mismatch(
                "series_2 length",
                series_1.len(),
                series_2.len(),
            ));
        }
        if series_1.len() < MIN_WINDOW {
            return Err(ConvergenceError::shape_mismatch(
                "series length",
                MIN_WINDOW,
                series_1.len(),
            ));
        }

        let errors = series_1.zip_map(&series_2, |a, b| (a - b).abs());
        Ok(Self { errors })
    }

    /// Convenience constructor copying from slices.
    pub fn from_slices(series_1: &[f64], series_2: &[f64]) -> Result<Self> {
        Self::new(
            DVector::from_column_slice(series_1),
            DVector::from_column_slice(series_2),
        )
    }

    /// Pairs a series with a constant steady-state target.
    pub fn against_target(series: &[f64], target: f64) -> Result<Self> {
        let targets = vec![target; series.len()];
        Self::from_slices(series, &targets)
    }

    /// Number of checkpoints.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false: construction rejects series shorter than [`MIN_WINDOW`].
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Pointwise absolute error `|series_1[k] - series_2[k]|`.
    pub fn errors(&self) -> &DVector<f64> {
        &self.errors
    }
}

/// Checks that a checkpoint spacing is usable as a time step.
pub(crate) fn validate_spacing(spacing: f64) -> Result<f64> {
    if spacing.is_finite() && spacing > 0.0 {
        Ok(spacing)
    } else {
        Err(ConvergenceError::InvalidSpacing { spacing })
    }
}

/// Back-calculates a constant checkpoint spacing from the recorded checkpoint times.
///
/// The first checkpoint is assumed to sit at time zero, so the spacing is
/// `max(times) / (times.len() - 1)`.
pub fn infer_checkpoint_spacing(times: &[f64]) -> Result<f64> {
    if times.len() < 2 {
        return Err(ConvergenceError::shape_mismatch(
            "checkpoint times",
            2,
            times.len(),
        ));
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(ConvergenceError::numerical("checkpoint time scan"));
    }
    let last = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    validate_spacing(last / (times.len() - 1) as f64)
}
