//! Growing-window convergence tracking for unsteady simulations.
//!
//! Each row estimates the convergence rate over the first `window` checkpoints,
//! for every window from [`RollingOptions::min_window`] up to the full series.
//! Windows only ever grow; no checkpoint is dropped from the front.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConvergenceError, DegeneracyKind, Result};
use crate::estimation::{from_slope, ConvergenceResult};
use crate::options::{DegeneratePolicy, RollingOptions, MIN_WINDOW};
use crate::series::{validate_spacing, SeriesPair};

/// One growing-window estimate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRow {
    /// Number of checkpoints in the window.
    pub window: usize,
    /// Physical time at the end of the window, `window * spacing`.
    pub time: f64,
    /// `None` when the window was degenerate and skipped.
    pub estimate: Option<ConvergenceResult>,
}

impl ConvergenceRow {
    /// Rate of this window, `None` when it was skipped.
    pub fn rate(&self) -> Option<f64> {
        self.estimate.map(|estimate| estimate.rate)
    }
}

/// Convergence rates in checkpoint order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RateSeries {
    rows: Vec<ConvergenceRow>,
}

impl RateSeries {
    /// Rows in checkpoint order.
    pub fn rows(&self) -> &[ConvergenceRow] {
        &self.rows
    }

    /// Number of windows, skipped ones included.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the series was shorter than the first window.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rate per row; skipped windows yield `None`.
    pub fn rates(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.rows.iter().map(ConvergenceRow::rate)
    }

    /// Physical time of the row at `index`.
    pub fn time_at(&self, index: usize) -> Option<f64> {
        self.rows.get(index).map(|row| row.time)
    }

    /// Number of windows skipped as degenerate.
    pub fn skipped(&self) -> usize {
        self.rows.iter().filter(|row| row.estimate.is_none()).count()
    }

    /// First row whose rate is at or below `precision`.
    pub fn convergence_time(&self, precision: f64) -> ConvergenceTime {
        let found = find_convergence_time(self.rates(), precision);
        if let ConvergenceTime::Reached(index) = found {
            let row = &self.rows[index];
            debug!(
                "converged to {:e} after {} checkpoints (time {})",
                precision, row.window, row.time
            );
        }
        found
    }
}

/// Position in a rate series where the convergence precision is first met.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceTime {
    /// Index of the first qualifying row.
    Reached(usize),
    /// No row satisfies the precision.
    NotFound,
}

impl ConvergenceTime {
    /// Row index when the precision was reached.
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Reached(index) => Some(index),
            Self::NotFound => None,
        }
    }

    /// Whether any row met the precision.
    pub fn is_reached(self) -> bool {
        matches!(self, Self::Reached(_))
    }
}

/// Returns the index of the first rate `<= precision`.
///
/// Missing rates (`None` or NaN) never qualify and never stop the scan, so a NaN
/// row next to a qualifying row does not hide it. A NaN `precision` matches nothing.
pub fn find_convergence_time<I>(rates: I, precision: f64) -> ConvergenceTime
where
    I: IntoIterator<Item = Option<f64>>,
{
    if precision.is_nan() {
        warn!("convergence precision is NaN; no rate can satisfy it");
        return ConvergenceTime::NotFound;
    }
    for (index, rate) in rates.into_iter().enumerate() {
        match rate {
            Some(rate) if !rate.is_nan() && rate <= precision => {
                return ConvergenceTime::Reached(index);
            }
            _ => continue,
        }
    }
    ConvergenceTime::NotFound
}

/// Prefix sums of the log-error transform, shared by every growing window.
///
/// With `y[k] = ln |ln epsilon[k + 1] - ln epsilon[k]|` and `x[k] = k`, a window of
/// `w` checkpoints fits the first `m = w - 1` points. Its slope is
/// `(sum(k * y) - x_mean * sum(y)) / (m * (m^2 - 1) / 12)` with `x_mean = (m - 1) / 2`,
/// so each window costs O(1) once the prefix sums exist.
#[derive(Debug)]
struct GrowingFit<'a> {
    errors: &'a [f64],
    sum_y: Vec<f64>,
    sum_xy: Vec<f64>,
    first_invalid: Option<(usize, DegeneracyKind)>,
    first_stalled: Option<usize>,
}

impl<'a> GrowingFit<'a> {
    fn new(errors: &'a [f64]) -> Self {
        let mut first_invalid = None;
        let mut first_stalled = None;
        let mut log_errors = Vec::with_capacity(errors.len());
        for (index, &error) in errors.iter().enumerate() {
            let kind = if !error.is_finite() {
                Some(DegeneracyKind::NonFinite)
            } else if error == 0.0 {
                Some(DegeneracyKind::ZeroError)
            } else {
                None
            };
            match kind {
                Some(kind) => {
                    if first_invalid.is_none() {
                        first_invalid = Some((index, kind));
                    }
                    log_errors.push(None);
                }
                None => log_errors.push(Some(error.ln())),
            }
        }

        // Points past a degenerate checkpoint only feed windows that are rejected anyway.
        let mut sum_y = Vec::with_capacity(errors.len());
        let mut sum_xy = Vec::with_capacity(errors.len());
        let (mut running_y, mut running_xy) = (0.0, 0.0);
        sum_y.push(running_y);
        sum_xy.push(running_xy);
        for k in 0..errors.len().saturating_sub(1) {
            let y = match (log_errors[k], log_errors[k + 1]) {
                (Some(current), Some(next)) if next != current => (next - current).abs().ln(),
                (Some(_), Some(_)) => {
                    if first_stalled.is_none() {
                        first_stalled = Some(k + 1);
                    }
                    0.0
                }
                _ => 0.0,
            };
            running_y += y;
            running_xy += k as f64 * y;
            sum_y.push(running_y);
            sum_xy.push(running_xy);
        }

        Self {
            errors,
            sum_y,
            sum_xy,
            first_invalid,
            first_stalled,
        }
    }

    /// Estimate over the first `window` checkpoints; `window` must be at least [`MIN_WINDOW`].
    fn window(&self, window: usize) -> Result<ConvergenceResult> {
        if let Some((index, kind)) = self.first_invalid.filter(|&(index, _)| index < window) {
            return Err(ConvergenceError::degenerate(index, window, kind));
        }
        if let Some(index) = self.first_stalled.filter(|&index| index < window) {
            return Err(ConvergenceError::degenerate(
                index,
                window,
                DegeneracyKind::StalledLogDifference,
            ));
        }

        let points = window - 1;
        let m = points as f64;
        let x_mean = (m - 1.0) / 2.0;
        let sxx = m * (m * m - 1.0) / 12.0;
        let slope = (self.sum_xy[points] - x_mean * self.sum_y[points]) / sxx;
        if !slope.is_finite() {
            return Err(ConvergenceError::numerical("line fit"));
        }
        from_slope(slope, self.errors[window - 1], self.errors[window - 2])
    }
}

/// Tracks the convergence rate of a series pair as its window grows.
#[derive(Clone, Debug)]
pub struct RollingConvergenceTracker {
    pair: SeriesPair,
    spacing: f64,
}

impl RollingConvergenceTracker {
    /// Builds a tracker for checkpoints spaced `spacing` apart.
    pub fn new(pair: SeriesPair, spacing: f64) -> Result<Self> {
        let spacing = validate_spacing(spacing)?;
        Ok(Self { pair, spacing })
    }

    /// Physical time between consecutive checkpoints.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Accessor for the tracked series pair.
    pub fn pair(&self) -> &SeriesPair {
        &self.pair
    }

    /// Estimates every growing window and returns the rows in checkpoint order.
    pub fn track(&self, options: &RollingOptions) -> Result<RateSeries> {
        let first = options.min_window.max(MIN_WINDOW);
        let windows: Vec<usize> = (first..=self.pair.len()).collect();
        let fit = GrowingFit::new(self.pair.errors().as_slice());

        let results: Vec<Result<ConvergenceResult>> = if options.parallel {
            windows.par_iter().map(|&window| fit.window(window)).collect()
        } else {
            windows.iter().map(|&window| fit.window(window)).collect()
        };

        let mut rows = Vec::with_capacity(windows.len());
        for (window, result) in windows.into_iter().zip(results) {
            let estimate = match result {
                Ok(estimate) => Some(estimate),
                Err(err) if err.is_degenerate() && options.policy == DegeneratePolicy::Skip => {
                    warn!("skipping window of {} checkpoints: {}", window, err);
                    None
                }
                Err(err) => return Err(err),
            };
            rows.push(ConvergenceRow {
                window,
                time: window as f64 * self.spacing,
                estimate,
            });
        }

        let series = RateSeries { rows };
        debug!(
            "tracked {} windows over {} checkpoints ({} skipped)",
            series.len(),
            self.pair.len(),
            series.skipped()
        );
        Ok(series)
    }
}

/// Growing-window convergence rates with default options.
pub fn rolling_convergence(
    series_1: &[f64],
    series_2: &[f64],
    checkpoint_spacing: f64,
) -> Result<RateSeries> {
    rolling_convergence_with_options(
        series_1,
        series_2,
        checkpoint_spacing,
        &RollingOptions::default(),
    )
}

/// Growing-window convergence rates with explicit options.
pub fn rolling_convergence_with_options(
    series_1: &[f64],
    series_2: &[f64],
    checkpoint_spacing: f64,
    options: &RollingOptions,
) -> Result<RateSeries> {
    let pair = SeriesPair::from_slices(series_1, series_2)?;
    RollingConvergenceTracker::new(pair, checkpoint_spacing)?.track(options)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::estimation::{estimate_convergence, ConvergenceEstimator};

    /// Decaying error with a mild alternating wobble so the convergence rate drifts.
    fn wobbly_decay(n: usize) -> Vec<f64> {
        (0..n)
            .map(|k| {
                let wobble = if k % 2 == 0 { 1.1 } else { 0.9 };
                0.6_f64.powi(k as i32) * wobble
            })
            .collect()
    }

    #[test]
    fn rows_cover_every_growing_window() {
        let series_1 = wobbly_decay(10);
        let series_2 = vec![0.0; 10];
        let series = rolling_convergence(&series_1, &series_2, 2.5).unwrap();

        assert_eq!(series.len(), 7);
        for (offset, row) in series.rows().iter().enumerate() {
            assert_eq!(row.window, offset + 4);
            assert_relative_eq!(row.time, row.window as f64 * 2.5);
            assert!(row.estimate.is_some());
        }
        assert_eq!(series.time_at(0), Some(10.0));
        assert_eq!(series.time_at(7), None);
    }

    #[test]
    fn last_row_matches_full_estimate() {
        let series_1 = wobbly_decay(12);
        let series_2 = vec![0.0; 12];
        let series = rolling_convergence(&series_1, &series_2, 1.0).unwrap();
        let full = estimate_convergence(&series_1, &series_2).unwrap();
        let last = series.rows().last().unwrap().estimate.unwrap();
        assert_relative_eq!(last.rate, full.rate, max_relative = 1e-12);
        assert_relative_eq!(last.constant, full.constant, max_relative = 1e-10);
    }

    #[test]
    fn prefix_sums_agree_with_least_squares_per_window() {
        let series_1: Vec<f64> = (0..60)
            .map(|k| 0.9_f64.powi(k) * (1.0 + 0.3 * (k as f64).sin()))
            .collect();
        let series_2 = vec![0.0; 60];
        let pair = SeriesPair::from_slices(&series_1, &series_2).unwrap();
        let estimator = ConvergenceEstimator::new(pair.clone());
        let series = RollingConvergenceTracker::new(pair, 1.0)
            .unwrap()
            .track(&RollingOptions::default())
            .unwrap();

        assert_eq!(series.skipped(), 0);
        for row in series.rows() {
            let expected = estimator.estimate_window(row.window).unwrap();
            let estimate = row.estimate.unwrap();
            assert_relative_eq!(estimate.rate, expected.rate, max_relative = 1e-10);
            assert_relative_eq!(estimate.constant, expected.constant, max_relative = 1e-8);
        }
    }

    #[test]
    fn stalled_window_reports_later_checkpoint() {
        let series_1 = vec![1.0, 0.5, 0.25, 0.2, 0.1, 0.1, 0.01];
        let series_2 = vec![0.0; 7];
        let series = rolling_convergence(&series_1, &series_2, 1.0).unwrap();
        let missing: Vec<usize> = series
            .rows()
            .iter()
            .filter(|row| row.estimate.is_none())
            .map(|row| row.window)
            .collect();
        assert_eq!(missing, vec![6, 7]);

        let options = RollingOptions::default().with_policy(DegeneratePolicy::Abort);
        let result = rolling_convergence_with_options(&series_1, &series_2, 1.0, &options);
        assert!(matches!(
            result,
            Err(ConvergenceError::DegenerateSeries {
                index: 5,
                length: 6,
                kind: DegeneracyKind::StalledLogDifference,
            })
        ));
    }

    #[test]
    fn overflowing_constant_follows_policy() {
        let errors = [1e-2, 1e-6, 1e-18, 1e-54, 1e-162, 1e-300];
        let zeros = [0.0; 6];

        let series = rolling_convergence(&errors, &zeros, 1.0).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.skipped(), 1);
        assert!(series.rows()[0].estimate.is_some());
        assert!(series.rows()[1].estimate.is_some());
        assert_eq!(series.rows()[2].window, 6);
        assert_eq!(series.rows()[2].rate(), None);

        let options = RollingOptions::default().with_policy(DegeneratePolicy::Abort);
        let result = rolling_convergence_with_options(&errors, &zeros, 1.0, &options);
        assert!(matches!(
            result,
            Err(ConvergenceError::NumericalError {
                context: "convergence constant"
            })
        ));
    }

    #[test]
    fn parallel_rows_match_serial_order() {
        let series_1 = wobbly_decay(40);
        let series_2 = vec![0.0; 40];
        let serial = rolling_convergence(&series_1, &series_2, 1.0).unwrap();
        let options = RollingOptions::default().with_parallel(true);
        let parallel =
            rolling_convergence_with_options(&series_1, &series_2, 1.0, &options).unwrap();
        assert_eq!(serial.rows(), parallel.rows());
    }

    #[test]
    fn skip_policy_marks_degenerate_windows_missing() {
        let mut series_1 = wobbly_decay(10);
        series_1[6] = 0.0;
        let series_2 = vec![0.0; 10];
        let series = rolling_convergence(&series_1, &series_2, 1.0).unwrap();

        assert_eq!(series.len(), 7);
        assert_eq!(series.skipped(), 4);
        let missing: Vec<usize> = series
            .rows()
            .iter()
            .filter(|row| row.estimate.is_none())
            .map(|row| row.window)
            .collect();
        assert_eq!(missing, vec![7, 8, 9, 10]);
    }

    #[test]
    fn abort_policy_fails_on_first_degenerate_window() {
        let mut series_1 = wobbly_decay(10);
        series_1[6] = 0.0;
        let series_2 = vec![0.0; 10];
        let options = RollingOptions::default()
            .with_policy(DegeneratePolicy::Abort)
            .with_parallel(true);
        let result = rolling_convergence_with_options(&series_1, &series_2, 1.0, &options);
        assert!(matches!(
            result,
            Err(ConvergenceError::DegenerateSeries {
                index: 6,
                length: 7,
                kind: DegeneracyKind::ZeroError,
            })
        ));
    }

    #[test]
    fn rejects_invalid_spacing() {
        let series_1 = wobbly_decay(6);
        let series_2 = vec![0.0; 6];
        for spacing in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                rolling_convergence(&series_1, &series_2, spacing),
                Err(ConvergenceError::InvalidSpacing { .. })
            ));
        }
    }

    #[test]
    fn larger_min_window_drops_leading_rows() {
        let series_1 = wobbly_decay(10);
        let series_2 = vec![0.0; 10];
        let options = RollingOptions::default().with_min_window(8);
        let series =
            rolling_convergence_with_options(&series_1, &series_2, 1.0, &options).unwrap();
        let windows: Vec<usize> = series.rows().iter().map(|row| row.window).collect();
        assert_eq!(windows, vec![8, 9, 10]);
    }

    #[test]
    fn search_skips_missing_rows() {
        let rates = vec![Some(0.5), None, Some(f64::NAN), Some(1e-7), Some(1e-9)];
        assert_eq!(
            find_convergence_time(rates, 1e-6),
            ConvergenceTime::Reached(3)
        );
    }

    #[test]
    fn nan_precision_matches_nothing() {
        let rates = vec![Some(0.0), Some(1e-9)];
        assert_eq!(
            find_convergence_time(rates, f64::NAN),
            ConvergenceTime::NotFound
        );
    }

    #[test]
    fn rate_series_search_reports_row_time() {
        let series = RateSeries {
            rows: vec![
                ConvergenceRow {
                    window: 4,
                    time: 40.0,
                    estimate: Some(ConvergenceResult {
                        rate: 0.2,
                        constant: 1.0,
                    }),
                },
                ConvergenceRow {
                    window: 5,
                    time: 50.0,
                    estimate: None,
                },
                ConvergenceRow {
                    window: 6,
                    time: 60.0,
                    estimate: Some(ConvergenceResult {
                        rate: 1e-7,
                        constant: 1.0,
                    }),
                },
            ],
        };
        let found = series.convergence_time(1e-6);
        assert_eq!(found.index(), Some(2));
        assert_eq!(series.time_at(2), Some(60.0));
        assert!(!series.convergence_time(1e-9).is_reached());
    }
}
