//! Common data types for eventvol

use serde::{Deserialize, Serialize};

/// Fit result containing parameter estimates and uncertainties.
///
/// This is the positional view of a fit; estimator crates wrap it together
/// with parameter names and model-specific diagnostics. It is serializable so
/// an external orchestrator can persist one record per (asset, specification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal, floored)
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Negative log-likelihood at minimum
    pub nll: f64,

    /// Convergence status. `false` is a soft failure: the estimates are still
    /// reported so batch harnesses can flag or retry, never silently dropped.
    pub converged: bool,

    /// Number of solver iterations
    pub n_iter: u64,

    /// Number of objective evaluations
    pub n_fev: usize,

    /// Number of gradient evaluations
    pub n_gev: usize,
}

impl FitResult {
    /// Create a new fit result without a covariance matrix
    pub fn new(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: u64,
        n_fev: usize,
        n_gev: usize,
    ) -> Self {
        Self { parameters, uncertainties, covariance: None, nll, converged, n_iter, n_fev, n_gev }
    }

    /// Create a fit result with covariance matrix
    #[allow(clippy::too_many_arguments)]
    pub fn with_covariance(
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        covariance: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: u64,
        n_fev: usize,
        n_gev: usize,
    ) -> Self {
        Self {
            parameters,
            uncertainties,
            covariance: Some(covariance),
            nll,
            converged,
            n_iter,
            n_fev,
            n_gev,
        }
    }

    /// Get correlation matrix element (i, j). Returns `None` if covariance is unavailable.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let sigma_i = self.uncertainties[i];
        let sigma_j = self.uncertainties[j];
        if sigma_i <= 0.0 || sigma_j <= 0.0 {
            return None;
        }
        Some(cov[i * n + j] / (sigma_i * sigma_j))
    }
}
