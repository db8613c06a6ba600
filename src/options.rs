//! Configuration for the growing-window convergence tracker.

use serde::{Deserialize, Serialize};

/// Smallest number of checkpoints a convergence estimate is computed from.
pub const MIN_WINDOW: usize = 4;

/// What to do with a window whose estimate is degenerate (zero error, stalled log-difference).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegeneratePolicy {
    /// Keep the row with a missing estimate and continue with the next window.
    #[default]
    Skip,
    /// Fail the whole call on the first degenerate window.
    Abort,
}

/// Controls how [`rolling_convergence`](crate::rolling::rolling_convergence) walks the windows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollingOptions {
    /// Size of the first window; never below [`MIN_WINDOW`].
    pub min_window: usize,
    /// Handling of degenerate windows.
    pub policy: DegeneratePolicy,
    /// Evaluate windows on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RollingOptions {
    fn default() -> Self {
        Self {
            min_window: MIN_WINDOW,
            policy: DegeneratePolicy::Skip,
            parallel: false,
        }
    }
}

impl RollingOptions {
    /// Start the growing window at `min_window` checkpoints (clamped to [`MIN_WINDOW`]).
    pub fn with_min_window(mut self, min_window: usize) -> Self {
        self.min_window = min_window.max(MIN_WINDOW);
        self
    }

    /// Override the degenerate-window policy while preserving other defaults.
    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable parallel evaluation of the windows.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
