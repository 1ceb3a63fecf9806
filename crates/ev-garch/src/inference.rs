//! Parameter-uncertainty estimation at the optimum.
//!
//! Two curvature sources behind one seam, selected by availability:
//!
//! - [`SolverCurvature`] reuses a quasi-Newton inverse-curvature estimate
//!   carried on the [`OptimizationResult`], costing zero extra likelihood
//!   evaluations. The bundled argmin backend does not expose its L-BFGS
//!   state, so this path activates only when another backend populates it.
//! - [`FiniteDifferenceHessian`] is the always-available fallback: forward
//!   differences of the gradient at θ*, symmetrized and eigenvalue-clipped
//!   before inversion (O(k) extra gradient evaluations, each of which is
//!   O(k) likelihood evaluations under numerical gradients).
//!
//! Standard errors are floored at [`SE_FLOOR`] so downstream t-statistics
//! never divide by zero.

use nalgebra::DMatrix;

use crate::optimizer::{ObjectiveFunction, OptimizationResult};

/// Lower bound applied to every reported standard error.
pub const SE_FLOOR: f64 = 1e-4;

/// A source of a covariance estimate for θ*.
pub trait Curvature {
    /// Covariance matrix at `best`, or `None` if this source cannot provide
    /// one (unavailable state, singular curvature).
    fn covariance(&self, objective: &dyn ObjectiveFunction, best: &[f64]) -> Option<DMatrix<f64>>;
}

/// Curvature reused from the solver's own quasi-Newton state.
pub struct SolverCurvature<'a> {
    result: &'a OptimizationResult,
}

impl<'a> SolverCurvature<'a> {
    /// Wrap an optimizer result.
    pub fn new(result: &'a OptimizationResult) -> Self {
        Self { result }
    }
}

impl Curvature for SolverCurvature<'_> {
    fn covariance(&self, _objective: &dyn ObjectiveFunction, best: &[f64]) -> Option<DMatrix<f64>> {
        let flat = self.result.inverse_curvature.as_ref()?;
        let n = best.len();
        if flat.len() != n * n {
            return None;
        }
        let cov = DMatrix::from_row_slice(n, n, flat);
        for i in 0..n {
            let v = cov[(i, i)];
            if !(v.is_finite() && v > 0.0) {
                return None;
            }
        }
        Some(cov)
    }
}

/// Numerical Hessian fallback.
#[derive(Debug, Clone, Copy)]
pub struct FiniteDifferenceHessian {
    /// Relative step for the forward differences (scaled by `max(|x_j|, 1)`).
    pub step: f64,
}

impl Default for FiniteDifferenceHessian {
    fn default() -> Self {
        Self { step: 1e-4 }
    }
}

impl Curvature for FiniteDifferenceHessian {
    fn covariance(&self, objective: &dyn ObjectiveFunction, best: &[f64]) -> Option<DMatrix<f64>> {
        let h = fd_hessian(objective, best, self.step).ok()?;
        covariance_from_hessian(&h)
    }
}

/// Compute the Hessian via forward differences of the gradient.
///
/// `H_{ij} ≈ (g_i(x + ε·e_j) − g_i(x)) / ε`, symmetrized as `(H + Hᵀ)/2`.
pub fn fd_hessian(
    objective: &dyn ObjectiveFunction,
    best: &[f64],
    step: f64,
) -> ev_core::Result<DMatrix<f64>> {
    let n = best.len();
    let grad_center = objective.gradient(best)?;

    let mut hessian = DMatrix::zeros(n, n);
    for j in 0..n {
        let eps = step * best[j].abs().max(1.0);

        let mut params_plus = best.to_vec();
        params_plus[j] += eps;
        let grad_plus = objective.gradient(&params_plus)?;

        for i in 0..n {
            hessian[(i, j)] = (grad_plus[i] - grad_center[i]) / eps;
        }
    }

    let ht = hessian.transpose();
    hessian = (&hessian + &ht) * 0.5;
    Ok(hessian)
}

/// Invert a (symmetrized) Hessian into a covariance matrix.
///
/// The numerically estimated Hessian can be slightly indefinite even at a
/// valid minimum; eigenvalues are clipped to a small positive floor before
/// inversion so variances stay positive. Returns `None` when the result is
/// still not a usable covariance (non-finite entries).
pub fn covariance_from_hessian(hessian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = hessian.nrows();
    if n == 0 || hessian.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let eigen = hessian.clone().symmetric_eigen();
    let lambda_max = eigen.eigenvalues.iter().fold(0.0_f64, |a, &l| a.max(l.abs()));
    let floor = 1e-10 * lambda_max.max(1.0);

    let mut inv_diag = DMatrix::zeros(n, n);
    for i in 0..n {
        inv_diag[(i, i)] = 1.0 / eigen.eigenvalues[i].max(floor);
    }
    let cov = &eigen.eigenvectors * inv_diag * eigen.eigenvectors.transpose();

    for i in 0..n {
        let v = cov[(i, i)];
        if !(v.is_finite() && v > 0.0) {
            return None;
        }
    }
    Some(cov)
}

/// Uncertainties from the Hessian diagonal alone (last-resort fallback).
pub fn diagonal_uncertainties(hessian: &DMatrix<f64>) -> Vec<f64> {
    (0..hessian.nrows())
        .map(|i| {
            let denom = hessian[(i, i)].abs().max(1e-12);
            1.0 / denom.sqrt()
        })
        .collect()
}

/// Covariance and floored standard errors at the optimum.
///
/// Tries the solver-reuse path first, then the finite-difference Hessian,
/// then the Hessian diagonal. Returns `(row-major covariance, standard
/// errors)`; the covariance is `None` whenever inversion failed and only the
/// diagonal estimate survives.
pub fn fit_uncertainties(
    objective: &dyn ObjectiveFunction,
    opt: &OptimizationResult,
) -> (Option<Vec<f64>>, Vec<f64>) {
    let n = opt.parameters.len();

    let cov = SolverCurvature::new(opt)
        .covariance(objective, &opt.parameters)
        .or_else(|| FiniteDifferenceHessian::default().covariance(objective, &opt.parameters));

    if let Some(cov) = cov {
        let ses: Vec<f64> =
            (0..n).map(|i| cov[(i, i)].sqrt().max(SE_FLOOR)).collect();
        let flat: Vec<f64> = cov.iter().copied().collect();
        return (Some(flat), ses);
    }

    log::warn!("Hessian inversion failed, using diagonal approximation");
    match fd_hessian(objective, &opt.parameters, FiniteDifferenceHessian::default().step) {
        Ok(h) => {
            let ses: Vec<f64> =
                diagonal_uncertainties(&h).into_iter().map(|s| s.max(SE_FLOOR)).collect();
            (None, ses)
        }
        Err(e) => {
            log::warn!("Gradient evaluation failed during Hessian fallback: {}", e);
            (None, vec![SE_FLOOR; n])
        }
    }
}
