use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a window of errors cannot be turned into a convergence estimate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegeneracyKind {
    /// The two series coincide at this checkpoint, so `ln(epsilon)` is undefined.
    ZeroError,
    /// Two consecutive errors are equal, so the log-difference is zero and its log undefined.
    StalledLogDifference,
    /// An input value (and therefore the error) is NaN or infinite.
    NonFinite,
}

impl fmt::Display for DegeneracyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroError => write!(f, "zero error"),
            Self::StalledLogDifference => write!(f, "zero log-error difference"),
            Self::NonFinite => write!(f, "non-finite value"),
        }
    }
}

/// Unified error type for `fluxrate` operations.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// Raised when the two series differ in length or are shorter than the minimum window.
    #[error("shape mismatch in {context}: expected {expected} but found {found}")]
    ShapeMismatch {
        /// Human-readable context describing the check.
        context: &'static str,
        /// The required length.
        expected: usize,
        /// The length that was actually supplied.
        found: usize,
    },

    /// Raised when the error series makes the log transform undefined.
    #[error("degenerate series: {kind} at index {index} (series length {length})")]
    DegenerateSeries {
        /// Offending checkpoint index.
        index: usize,
        /// Length of the series (or window) being estimated.
        length: usize,
        /// Which part of the log transform broke down.
        kind: DegeneracyKind,
    },

    /// Raised when the checkpoint spacing is not a positive finite number.
    #[error("checkpoint spacing must be positive and finite, found {spacing}")]
    InvalidSpacing {
        /// The spacing that was supplied.
        spacing: f64,
    },

    /// Raised when the least-squares normal equations cannot be solved.
    #[error("normal equations of the line fit are singular")]
    SingularFit,

    /// Raised when an intermediate or final value is NaN or infinite.
    #[error("encountered non-finite value during {context}")]
    NumericalError { context: &'static str },
}

impl ConvergenceError {
    /// Helper to format a [`ShapeMismatch`](ConvergenceError::ShapeMismatch) error.
    pub fn shape_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::ShapeMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper to format a [`DegenerateSeries`](ConvergenceError::DegenerateSeries) error.
    pub fn degenerate(index: usize, length: usize, kind: DegeneracyKind) -> Self {
        Self::DegenerateSeries {
            index,
            length,
            kind,
        }
    }

    /// Helper to raise when a computed value is NaN or infinite.
    pub fn numerical(context: &'static str) -> Self {
        Self::NumericalError { context }
    }

    /// Whether this error describes a single unusable window rather than bad call arguments.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::DegenerateSeries { .. } | Self::NumericalError { .. } | Self::SingularFit
        )
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, ConvergenceError>;
