//! Error types for eventvol

use thiserror::Error;

/// eventvol error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input or configuration, detected before any computation.
    ///
    /// Covers non-finite return series, exogenous-regressor length mismatches,
    /// and bound combinations that leave the stationarity region empty.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical computation failed in a way that cannot be recovered locally
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
