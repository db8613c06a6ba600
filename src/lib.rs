//! Convergence-rate estimation for boundary flux series from hydrodynamic simulations.
//!
//! Steady and unsteady 2D simulations are usually judged converged once the flux
//! through the inflow boundary matches the flux through the outflow boundary, or once
//! a monitored quantity settles on its steady-state value. This crate quantifies that
//! judgement from two aligned series recorded at successive checkpoints:
//!
//! - pair and validate the series (`series` module),
//! - estimate a single convergence rate `iota` and constant `c` (`estimation` module),
//! - follow how the rate evolves as the window of checkpoints grows, and find the first
//!   checkpoint at which a target precision is met (`rolling` module).
//!
//! The estimate assumes the asymptotic relation `epsilon[n + 1] = c * epsilon[n]^iota`
//! for the error `epsilon = |series_1 - series_2|`. Locating simulation output,
//! extracting fluxes and plotting are left to the caller.
//!
//! # Quick start
//!
//! ```no_run
//! use fluxrate::{estimate_convergence, rolling_convergence, ConvergenceTime};
//!
//! // Fluxes through the inflow and outflow boundaries, one value per printout.
//! let inflow = vec![100.0, 100.0, 100.0, 100.0, 100.0, 100.0];
//! let outflow = vec![40.0, 76.0, 90.4, 96.16, 98.464, 99.3856];
//!
//! let overall = estimate_convergence(&inflow, &outflow).expect("well-posed series");
//! println!("rate {} constant {}", overall.rate, overall.constant);
//!
//! let rates = rolling_convergence(&inflow, &outflow, 50.0).expect("valid spacing");
//! match rates.convergence_time(1e-6) {
//!     ConvergenceTime::Reached(index) => {
//!         println!("converged after {:?} s", rates.time_at(index));
//!     }
//!     ConvergenceTime::NotFound => println!("not converged yet"),
//! }
//! ```

pub mod error;
pub mod estimation;
pub mod fit;
pub mod options;
pub mod rolling;
pub mod series;

pub use error::{ConvergenceError, DegeneracyKind, Result};
pub use estimation::{estimate_convergence, ConvergenceEstimator, ConvergenceResult};
pub use options::{DegeneratePolicy, RollingOptions, MIN_WINDOW};
pub use rolling::{
    find_convergence_time, rolling_convergence, rolling_convergence_with_options,
    ConvergenceRow, ConvergenceTime, RateSeries, RollingConvergenceTracker,
};
pub use series::{infer_checkpoint_spacing, SeriesPair};
