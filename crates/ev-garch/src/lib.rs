//! # ev-garch
//!
//! Threshold-GARCH (TARCH-X) maximum-likelihood estimation for event-study
//! volatility analysis: a GJR-GARCH(1,1) conditional-variance model with
//! exogenous regressors (event dummies, sentiment scores) and standardized
//! Student-t innovations, fit by L-BFGS-B under box bounds and an explicit
//! stationarity constraint.
//!
//! One fit is a single-threaded, deterministic computation; batches of
//! (asset, specification) fits parallelize across, not within, fits.
//!
//! ```
//! use ev_garch::{TarchXConfig, VolSpec, simulate_tarchx, tarchx_fit, TarchXParams};
//!
//! let truth = TarchXParams {
//!     omega: 0.05, alpha: 0.08, gamma: 0.05, beta: 0.85, delta: vec![], nu: 8.0,
//! };
//! let spec = VolSpec::tarch();
//! let sim = simulate_tarchx(&truth, &spec, 300, 42).unwrap();
//! let fit = tarchx_fit(&sim.returns, &spec, &TarchXConfig::default()).unwrap();
//! assert!(fit.persistence < 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Parallel fitting across independent assets.
pub mod batch;
/// Information criteria (AIC/BIC) and ranking helpers.
pub mod criteria;
/// Standard errors via solver-curvature reuse or numerical Hessian.
pub mod inference;
/// Generic L-BFGS-B wrapper with box bounds and inequality constraints.
pub mod optimizer;
/// Seeded simulation of TARCH-X paths.
pub mod simulate;
/// The TARCH-X model family: recursion, likelihood, constraint, fit driver.
pub mod tarchx;

pub use batch::{FitRecord, FitRequest, fit_batch};
pub use criteria::{InformationCriteria, aic, bic, rank_by_aic, rank_by_bic};
pub use inference::{Curvature, FiniteDifferenceHessian, SE_FLOOR, SolverCurvature};
pub use optimizer::{
    InequalityConstraint, LbfgsbOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig,
    PENALTY_NLL,
};
pub use simulate::{SimulatedPath, simulate_tarchx};
pub use tarchx::{
    ExogSeries, StationarityConstraint, TarchXConfig, TarchXFit, TarchXParams, VolSpec,
    negative_log_likelihood, tarchx_fit, variance_path,
};
