//! # ev-core
//!
//! Shared building blocks for eventvol: the error taxonomy and the generic
//! fit-result type that every estimator in the workspace reports through.
//!
//! Design rule: structural problems (bad shapes, non-finite inputs, infeasible
//! bound configurations) surface as [`Error`] before any optimization starts;
//! a solver that merely fails to converge is *not* an error and is reported
//! through [`FitResult::converged`] instead.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::FitResult;
