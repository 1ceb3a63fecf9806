//! Probability building blocks for eventvol.
//!
//! This crate hosts reusable probability math used by the volatility
//! estimators:
//! - Student-t log-densities, including the unit-variance ("standardized")
//!   parameterization that GARCH-family likelihoods sum over
//! - small numeric helpers (stable exponential, sample moments)

pub mod math;
pub mod student_t;

pub use student_t::StandardizedT;
