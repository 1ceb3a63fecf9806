//! Threshold-GARCH estimation with exogenous variance regressors (TARCH-X).
//!
//! The conditional-variance equation is
//!
//! ```text
//! σ²_t = ω + α·ε²_{t-1} + γ·ε²_{t-1}·I(ε_{t-1} < 0) + β·σ²_{t-1} + Σ_j δ_j·x_{j,t}
//! ```
//!
//! with standardized Student-t innovations (dof ν), fit by maximum likelihood
//! under box bounds and the stationarity constraint `α + β + |γ|/2 < c`.
//! The constraint is handed to the solver as a first-class
//! [`InequalityConstraint`]; it is *not* an implicit property of the
//! likelihood, so a caller can see in the fit driver exactly where it is
//! wired in.
//!
//! Nested variants are points of the specification space: GARCH(1,1) is
//! leverage off with no regressors, TARCH(1,1) adds the leverage term,
//! TARCH-X adds event dummies and sentiment columns. One estimator serves
//! all three so information criteria are comparable across them.
//!
//! Returns are treated as residuals: demeaning happens upstream and the
//! parameter vector carries no location term.

use ev_core::{Error, FitResult, Result};
use ev_prob::StandardizedT;
use ev_prob::math::{mean, var_pop};
use serde::{Deserialize, Serialize};

use crate::criteria::InformationCriteria;
use crate::inference::{SE_FLOOR, fit_uncertainties};
use crate::optimizer::{
    InequalityConstraint, LbfgsbOptimizer, ObjectiveFunction, OptimizerConfig, PENALTY_NLL,
};

// ---------------------------------------------------------------------------
// Specification
// ---------------------------------------------------------------------------

/// One exogenous variance regressor: a named column aligned 1:1 with the
/// return series by time index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExogSeries {
    /// Column name; becomes the coefficient's parameter name.
    pub name: String,
    /// Values, one per observation. Event dummies are conventionally near
    /// {0, 0.5, 1}; sentiment columns are real-valued.
    pub values: Vec<f64>,
}

impl ExogSeries {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values }
    }
}

/// Model specification: which variance terms are active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolSpec {
    /// Include the threshold/leverage term `γ·ε²·I(ε<0)`.
    pub leverage: bool,
    /// Ordered exogenous regressors. The order fixes the parameter layout.
    pub exog: Vec<ExogSeries>,
}

impl VolSpec {
    /// Plain GARCH(1,1): no leverage term, no exogenous regressors.
    pub fn garch() -> Self {
        Self { leverage: false, exog: Vec::new() }
    }

    /// TARCH(1,1): leverage term, no exogenous regressors.
    pub fn tarch() -> Self {
        Self { leverage: true, exog: Vec::new() }
    }

    /// TARCH-X: leverage term plus exogenous variance regressors.
    pub fn tarchx(exog: Vec<ExogSeries>) -> Self {
        Self { leverage: true, exog }
    }

    /// Number of exogenous regressors.
    pub fn n_exog(&self) -> usize {
        self.exog.len()
    }

    /// Number of free parameters: ω, α, (γ), β, δ_1..k, ν.
    pub fn dim(&self) -> usize {
        4 + usize::from(self.leverage) + self.exog.len()
    }

    /// Stable parameter names, in packed order.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.dim());
        names.push("omega".to_string());
        names.push("alpha".to_string());
        if self.leverage {
            names.push("gamma".to_string());
        }
        names.push("beta".to_string());
        for x in &self.exog {
            names.push(x.name.clone());
        }
        names.push("nu".to_string());
        names
    }

    /// Validate the specification against a return series: every regressor
    /// must be finite, aligned with the returns, and uniquely named.
    pub fn validate_against(&self, returns: &[f64]) -> Result<()> {
        for x in &self.exog {
            if x.name.is_empty() {
                return Err(Error::Validation("exogenous regressor name is empty".to_string()));
            }
            if x.values.len() != returns.len() {
                return Err(Error::Validation(format!(
                    "regressor '{}' length ({}) != returns length ({})",
                    x.name,
                    x.values.len(),
                    returns.len()
                )));
            }
            if x.values.iter().any(|v| !v.is_finite()) {
                return Err(Error::Validation(format!(
                    "regressor '{}' contains non-finite values",
                    x.name
                )));
            }
        }
        for i in 1..self.exog.len() {
            if self.exog[..i].iter().any(|x| x.name == self.exog[i].name) {
                return Err(Error::Validation(format!(
                    "duplicate regressor name '{}'",
                    self.exog[i].name
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameters of a TARCH-X model.
///
/// `gamma` is 0 and not a free parameter when the specification has the
/// leverage term disabled; `delta` is empty without exogenous regressors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TarchXParams {
    /// Variance intercept (> 0).
    pub omega: f64,
    /// ARCH coefficient (≥ 0).
    pub alpha: f64,
    /// Leverage/threshold coefficient (signed).
    pub gamma: f64,
    /// GARCH persistence coefficient.
    pub beta: f64,
    /// Exogenous-regressor coefficients, in specification order. Unbounded:
    /// the analysis measures effect magnitude, so no sign is imposed.
    pub delta: Vec<f64>,
    /// Student-t degrees of freedom (> 2).
    pub nu: f64,
}

impl TarchXParams {
    /// Realized stationarity quantity `α + β + |γ|/2`.
    ///
    /// γ enters in absolute value because it is signed here, unlike the
    /// γ ≥ 0 convention some GJR parameterizations adopt.
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta + 0.5 * self.gamma.abs()
    }

    /// Flatten into the positional layout `[ω, α, (γ), β, δ…, ν]`.
    pub fn pack(&self, spec: &VolSpec) -> Result<Vec<f64>> {
        if self.delta.len() != spec.n_exog() {
            return Err(Error::Validation(format!(
                "delta length ({}) != number of regressors ({})",
                self.delta.len(),
                spec.n_exog()
            )));
        }
        let mut v = Vec::with_capacity(spec.dim());
        v.push(self.omega);
        v.push(self.alpha);
        if spec.leverage {
            v.push(self.gamma);
        }
        v.push(self.beta);
        v.extend_from_slice(&self.delta);
        v.push(self.nu);
        Ok(v)
    }

    /// Rebuild from the positional layout.
    pub fn unpack(spec: &VolSpec, params: &[f64]) -> Result<Self> {
        if params.len() != spec.dim() {
            return Err(Error::Validation(format!(
                "expected {} params for this specification, got {}",
                spec.dim(),
                params.len()
            )));
        }
        let mut it = params.iter().copied();
        let omega = it.next().unwrap_or(f64::NAN);
        let alpha = it.next().unwrap_or(f64::NAN);
        let gamma = if spec.leverage { it.next().unwrap_or(f64::NAN) } else { 0.0 };
        let beta = it.next().unwrap_or(f64::NAN);
        let delta: Vec<f64> = (0..spec.n_exog()).map(|_| it.next().unwrap_or(f64::NAN)).collect();
        let nu = it.next().unwrap_or(f64::NAN);
        Ok(Self { omega, alpha, gamma, beta, delta, nu })
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for TARCH-X fitting.
///
/// Box bounds and the persistence cap are plain fields rather than constants:
/// the "right" β cap and whether δ's deserve bounds are research judgments
/// that shift between studies, so callers can override any of them. The
/// defaults keep the stationarity region non-empty (β capped at 0.95,
/// strictly inside `persistence_max`), which [`TarchXConfig::validate`]
/// re-checks for whatever combination is supplied.
#[derive(Debug, Clone)]
pub struct TarchXConfig {
    /// Solver configuration.
    pub optimizer: OptimizerConfig,
    /// Stationarity cap `c`: the fit enforces `α + β + |γ|/2 < c`.
    pub persistence_max: f64,
    /// Pass the stationarity constraint to the solver. Default `true`;
    /// disabling exists for diagnosing what an unconstrained fit would do
    /// and must never ship in analysis code.
    pub enforce_stationarity: bool,
    /// Bounds for ω (lower must be > 0).
    pub omega_bounds: (f64, f64),
    /// Bounds for α.
    pub alpha_bounds: (f64, f64),
    /// Bounds for γ (ignored when the spec has no leverage term).
    pub gamma_bounds: (f64, f64),
    /// Bounds for β; the upper bound must leave the constraint satisfiable.
    pub beta_bounds: (f64, f64),
    /// Bounds applied to every δ_j. Unbounded by default.
    pub delta_bounds: (f64, f64),
    /// Bounds for ν (lower must be > 2 for finite variance).
    pub nu_bounds: (f64, f64),
    /// Variance-path floor `σ²_min`.
    pub var_floor: f64,
    /// Variance-path ceiling `σ²_max`.
    pub var_ceil: f64,
    /// Optional override of the default initial guess.
    pub init: Option<TarchXParams>,
}

impl Default for TarchXConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerConfig::default(),
            persistence_max: 0.999,
            enforce_stationarity: true,
            omega_bounds: (1e-8, f64::INFINITY),
            alpha_bounds: (0.0, 0.5),
            gamma_bounds: (-0.5, 0.5),
            beta_bounds: (0.0, 0.95),
            delta_bounds: (f64::NEG_INFINITY, f64::INFINITY),
            nu_bounds: (2.1, 50.0),
            var_floor: 1e-8,
            var_ceil: 1e8,
            init: None,
        }
    }
}

fn check_bounds(name: &str, (lo, hi): (f64, f64)) -> Result<()> {
    if lo.is_nan() || hi.is_nan() || lo > hi {
        return Err(Error::Validation(format!("invalid {} bounds: ({}, {})", name, lo, hi)));
    }
    Ok(())
}

impl TarchXConfig {
    /// Validate the bound/constraint combination for a given specification.
    ///
    /// An empty stationarity region is a configuration bug, not a data
    /// problem, so it fails fast here rather than surfacing as a mysterious
    /// non-convergence later.
    pub fn validate(&self, spec: &VolSpec) -> Result<()> {
        if !(self.var_floor.is_finite() && self.var_floor > 0.0 && self.var_ceil.is_finite()) {
            return Err(Error::Validation("variance floor/ceiling must be finite and > 0".into()));
        }
        if self.var_floor >= self.var_ceil {
            return Err(Error::Validation(format!(
                "variance floor ({:e}) must be below ceiling ({:e})",
                self.var_floor, self.var_ceil
            )));
        }
        if !(self.persistence_max > 0.0 && self.persistence_max < 1.0) {
            return Err(Error::Validation(format!(
                "persistence_max must be in (0, 1), got {}",
                self.persistence_max
            )));
        }
        check_bounds("omega", self.omega_bounds)?;
        check_bounds("alpha", self.alpha_bounds)?;
        check_bounds("gamma", self.gamma_bounds)?;
        check_bounds("beta", self.beta_bounds)?;
        check_bounds("delta", self.delta_bounds)?;
        check_bounds("nu", self.nu_bounds)?;
        if self.omega_bounds.0 <= 0.0 {
            return Err(Error::Validation("omega lower bound must be > 0".into()));
        }
        if self.alpha_bounds.0 < 0.0 || self.beta_bounds.0 < 0.0 {
            return Err(Error::Validation("alpha/beta lower bounds must be >= 0".into()));
        }
        if self.nu_bounds.0 <= 2.0 {
            return Err(Error::Validation(
                "nu lower bound must be > 2 (finite innovation variance)".into(),
            ));
        }

        if self.enforce_stationarity {
            // Smallest achievable persistence over the box. γ contributes its
            // minimum absolute value, which is 0 whenever the range straddles 0.
            let gamma_min_abs = if !spec.leverage {
                0.0
            } else if self.gamma_bounds.0 <= 0.0 && self.gamma_bounds.1 >= 0.0 {
                0.0
            } else {
                self.gamma_bounds.0.abs().min(self.gamma_bounds.1.abs())
            };
            let floor_persistence =
                self.alpha_bounds.0 + self.beta_bounds.0 + 0.5 * gamma_min_abs;
            if floor_persistence >= self.persistence_max {
                return Err(Error::Validation(format!(
                    "stationarity region is empty: minimum α+β+|γ|/2 over the bounds is {:.4} \
                     but persistence_max is {:.4}",
                    floor_persistence, self.persistence_max
                )));
            }
        }
        Ok(())
    }

    /// Box bounds in packed order for a given specification.
    pub fn bounds(&self, spec: &VolSpec) -> Vec<(f64, f64)> {
        let mut b = Vec::with_capacity(spec.dim());
        b.push(self.omega_bounds);
        b.push(self.alpha_bounds);
        if spec.leverage {
            b.push(self.gamma_bounds);
        }
        b.push(self.beta_bounds);
        for _ in 0..spec.n_exog() {
            b.push(self.delta_bounds);
        }
        b.push(self.nu_bounds);
        b
    }

    /// Initial guess in packed order, clamped into the bounds and shrunk
    /// into the stationarity region if necessary.
    fn initial_guess(&self, returns: &[f64], spec: &VolSpec) -> Result<Vec<f64>> {
        let params = match &self.init {
            Some(p) => {
                let v = p.pack(spec)?;
                if v.iter().any(|x| !x.is_finite()) {
                    return Err(Error::Validation("initial guess must be finite".into()));
                }
                p.clone()
            }
            None => {
                let v0 = var_pop(returns, mean(returns)).max(1e-12);
                TarchXParams {
                    omega: 0.1 * v0,
                    alpha: 0.05,
                    gamma: if spec.leverage { 0.03 } else { 0.0 },
                    beta: 0.85,
                    delta: vec![0.0; spec.n_exog()],
                    nu: 8.0,
                }
            }
        };

        let mut v = params.pack(spec)?;
        for (x, &(lo, hi)) in v.iter_mut().zip(self.bounds(spec).iter()) {
            *x = x.clamp(lo, hi);
        }

        if self.enforce_stationarity {
            let mut p = TarchXParams::unpack(spec, &v)?;
            let target = 0.95 * self.persistence_max;
            if p.persistence() >= target {
                let scale = target / p.persistence();
                p.alpha *= scale;
                p.gamma *= scale;
                p.beta *= scale;
                // Re-clamping can push persistence back up (high lower bounds);
                // fall back to the corner validate() proved feasible.
                let mut w = p.pack(spec)?;
                for (x, &(lo, hi)) in w.iter_mut().zip(self.bounds(spec).iter()) {
                    *x = x.clamp(lo, hi);
                }
                let q = TarchXParams::unpack(spec, &w)?;
                if q.persistence() < self.persistence_max {
                    v = w;
                } else {
                    let mut corner = q;
                    corner.alpha = self.alpha_bounds.0;
                    corner.beta = self.beta_bounds.0;
                    corner.gamma = if spec.leverage {
                        self.gamma_bounds.0.max(0.0).min(self.gamma_bounds.1)
                    } else {
                        0.0
                    };
                    v = corner.pack(spec)?;
                }
            }
        }
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Variance recursion
// ---------------------------------------------------------------------------

/// Compute the conditional-variance path `σ²_1..T`.
///
/// Pure function of (θ, data): no side effects, no randomness, identical
/// inputs give identical output. Seeded at `t = 1` with the sample variance
/// of the returns. Every step is clipped into `[var_floor, var_ceil]` —
/// solvers probe infeasible regions during line search and must see
/// large-but-finite values there, never NaN.
pub fn variance_path(
    params: &TarchXParams,
    returns: &[f64],
    spec: &VolSpec,
    var_floor: f64,
    var_ceil: f64,
) -> Vec<f64> {
    let t_len = returns.len();
    let mut h = vec![0.0_f64; t_len];
    if t_len == 0 {
        return h;
    }

    let mut seed = var_pop(returns, mean(returns));
    if !seed.is_finite() || seed <= 0.0 {
        seed = var_floor;
    }
    h[0] = seed.clamp(var_floor, var_ceil);

    let gamma = if spec.leverage { params.gamma } else { 0.0 };
    for t in 1..t_len {
        let prev = returns[t - 1];
        let prev2 = prev * prev;
        let indicator = if prev < 0.0 { 1.0 } else { 0.0 };
        let mut v = params.omega
            + params.alpha * prev2
            + gamma * prev2 * indicator
            + params.beta * h[t - 1];
        for (d, x) in params.delta.iter().zip(spec.exog.iter()) {
            v += d * x.values[t];
        }
        h[t] = if v.is_finite() { v.clamp(var_floor, var_ceil) } else { var_ceil };
    }
    h
}

// ---------------------------------------------------------------------------
// Likelihood
// ---------------------------------------------------------------------------

/// Negative log-likelihood of the return series under standardized Student-t
/// innovations with the given conditional-variance path parameters.
///
/// Total: never NaN/Inf and never panics. Undefined regions (non-finite θ,
/// ω ≤ 0, ν ≤ 2) cost the finite sentinel [`PENALTY_NLL`] so the solver's
/// line search can recover. No internal randomness: identical (θ, data)
/// give bit-identical values.
pub fn negative_log_likelihood(
    params: &TarchXParams,
    returns: &[f64],
    spec: &VolSpec,
    cfg: &TarchXConfig,
) -> f64 {
    if !params.omega.is_finite()
        || !params.alpha.is_finite()
        || !params.gamma.is_finite()
        || !params.beta.is_finite()
        || !params.nu.is_finite()
        || params.delta.iter().any(|d| !d.is_finite())
        || params.omega <= 0.0
        || params.nu <= 2.0
    {
        return PENALTY_NLL;
    }
    let innovation = match StandardizedT::new(params.nu) {
        Ok(t) => t,
        Err(_) => return PENALTY_NLL,
    };

    let h = variance_path(params, returns, spec, cfg.var_floor, cfg.var_ceil);
    let mut ll = 0.0_f64;
    for (&r, &ht) in returns.iter().zip(h.iter()) {
        ll += innovation.logpdf(r, ht);
    }
    let nll = -ll;
    if nll.is_finite() { nll } else { PENALTY_NLL }
}

// ---------------------------------------------------------------------------
// Objective and constraint
// ---------------------------------------------------------------------------

/// Stationarity constraint `g(θ) = c − (α + β + |γ|/2) ≥ 0` in packed layout.
#[derive(Debug, Clone, Copy)]
pub struct StationarityConstraint {
    persistence_max: f64,
    leverage: bool,
}

impl StationarityConstraint {
    /// Build the constraint for a specification.
    pub fn new(persistence_max: f64, spec: &VolSpec) -> Self {
        Self { persistence_max, leverage: spec.leverage }
    }
}

impl InequalityConstraint for StationarityConstraint {
    fn value(&self, params: &[f64]) -> f64 {
        let alpha = params[1];
        let (gamma, beta) =
            if self.leverage { (params[2], params[3]) } else { (0.0, params[2]) };
        self.persistence_max - (alpha + beta + 0.5 * gamma.abs())
    }

    fn name(&self) -> &str {
        "stationarity"
    }
}

/// The packed-vector objective handed to the solver.
struct TarchxObjective<'a> {
    returns: &'a [f64],
    spec: &'a VolSpec,
    cfg: &'a TarchXConfig,
}

impl ObjectiveFunction for TarchxObjective<'_> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let p = TarchXParams::unpack(self.spec, params)?;
        Ok(negative_log_likelihood(&p, self.returns, self.spec, self.cfg))
    }
}

// ---------------------------------------------------------------------------
// Fit
// ---------------------------------------------------------------------------

/// Result of a TARCH-X fit.
///
/// Serializable so an orchestrator can write one record per
/// (asset, specification). Names, estimates, uncertainties, and t-statistics
/// share one positional order ([`VolSpec::parameter_names`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TarchXFit {
    /// Parameter names in packed order.
    pub names: Vec<String>,
    /// Structured view of the estimates.
    pub params: TarchXParams,
    /// Positional estimates, standard errors, covariance, NLL, and
    /// convergence status.
    pub result: FitResult,
    /// Log-likelihood at the optimum (`= -result.nll`).
    pub log_likelihood: f64,
    /// Information criteria plus the `k`/`n` they were computed from.
    pub criteria: InformationCriteria,
    /// `estimate / standard error`, per parameter. Standard errors are
    /// floored, so this never divides by zero.
    pub t_stats: Vec<f64>,
    /// Realized stationarity quantity `α + β + |γ|/2`.
    pub persistence: f64,
    /// Whether the realized persistence respects the configured cap.
    pub stationary: bool,
    /// Conditional-variance path at the optimum.
    pub conditional_variance: Vec<f64>,
    /// Solver termination message.
    pub message: String,
}

impl TarchXFit {
    /// Whether the solver converged (and the optimum is feasible).
    pub fn converged(&self) -> bool {
        self.result.converged
    }

    /// Point estimate by parameter name.
    pub fn estimate(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(self.result.parameters[i])
    }

    /// Standard error by parameter name.
    pub fn std_error(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(self.result.uncertainties[i])
    }

    /// t-statistic by parameter name.
    pub fn t_stat(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == name)?;
        Some(self.t_stats[i])
    }
}

/// Fit a TARCH-X model by constrained maximum likelihood.
///
/// Fails fast (`Err`) only on structural problems: non-finite inputs,
/// regressor misalignment, or a bound combination with an empty stationarity
/// region. A solver that runs out of iterations is a *soft* failure reported
/// through `result.converged`, so a batch of assets can carry on and flag the
/// stragglers.
pub fn tarchx_fit(returns: &[f64], spec: &VolSpec, cfg: &TarchXConfig) -> Result<TarchXFit> {
    if returns.is_empty() {
        return Err(Error::Validation("returns must be non-empty".to_string()));
    }
    if returns.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("returns must be finite".to_string()));
    }
    spec.validate_against(returns)?;
    cfg.validate(spec)?;

    let bounds = cfg.bounds(spec);
    let init = cfg.initial_guess(returns, spec)?;
    let objective = TarchxObjective { returns, spec, cfg };

    let constraint = StationarityConstraint::new(cfg.persistence_max, spec);
    let constraints: Vec<&dyn InequalityConstraint> = if cfg.enforce_stationarity {
        vec![&constraint as &dyn InequalityConstraint]
    } else {
        Vec::new()
    };

    let opt = LbfgsbOptimizer::new(cfg.optimizer.clone()).minimize_constrained(
        &objective,
        &init,
        &bounds,
        &constraints,
    )?;
    if !opt.converged {
        log::warn!("TARCH-X fit did not converge: {}", opt.message);
    }

    let params = TarchXParams::unpack(spec, &opt.parameters)?;
    let conditional_variance =
        variance_path(&params, returns, spec, cfg.var_floor, cfg.var_ceil);
    let nll = negative_log_likelihood(&params, returns, spec, cfg);
    let log_likelihood = -nll;

    let (covariance, uncertainties) = fit_uncertainties(&objective, &opt);
    let t_stats: Vec<f64> = opt
        .parameters
        .iter()
        .zip(uncertainties.iter())
        .map(|(&p, &se)| p / se.max(SE_FLOOR))
        .collect();

    let result = match covariance {
        Some(cov) => FitResult::with_covariance(
            opt.parameters.clone(),
            uncertainties,
            cov,
            nll,
            opt.converged,
            opt.n_iter,
            opt.n_fev,
            opt.n_gev,
        ),
        None => FitResult::new(
            opt.parameters.clone(),
            uncertainties,
            nll,
            opt.converged,
            opt.n_iter,
            opt.n_fev,
            opt.n_gev,
        ),
    };

    let persistence = params.persistence();
    let criteria =
        InformationCriteria::new(log_likelihood, spec.dim(), returns.len());

    Ok(TarchXFit {
        names: spec.parameter_names(),
        params,
        result,
        log_likelihood,
        criteria,
        t_stats,
        persistence,
        stationary: persistence < cfg.persistence_max,
        conditional_variance,
        message: opt.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_returns() -> Vec<f64> {
        vec![0.1, -0.2, 0.05, 0.3, -0.15, 0.02, 0.01, -0.4, 0.35, -0.1, 0.05, -0.02]
    }

    fn base_params() -> TarchXParams {
        TarchXParams { omega: 0.05, alpha: 0.08, gamma: 0.05, beta: 0.85, delta: vec![], nu: 8.0 }
    }

    #[test]
    fn parameter_names_follow_layout() {
        let spec = VolSpec::tarchx(vec![
            ExogSeries::new("hack_dummy", vec![0.0; 3]),
            ExogSeries::new("sent_neg", vec![0.0; 3]),
        ]);
        assert_eq!(
            spec.parameter_names(),
            vec!["omega", "alpha", "gamma", "beta", "hack_dummy", "sent_neg", "nu"]
        );
        assert_eq!(spec.dim(), 7);

        let garch = VolSpec::garch();
        assert_eq!(garch.parameter_names(), vec!["omega", "alpha", "beta", "nu"]);
        assert_eq!(garch.dim(), 4);
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let spec = VolSpec::tarchx(vec![ExogSeries::new("x1", vec![0.0; 4])]);
        let p = TarchXParams {
            omega: 0.03,
            alpha: 0.07,
            gamma: -0.04,
            beta: 0.8,
            delta: vec![0.5],
            nu: 6.0,
        };
        let v = p.pack(&spec).unwrap();
        assert_eq!(v.len(), spec.dim());
        let q = TarchXParams::unpack(&spec, &v).unwrap();
        assert_eq!(q.gamma, p.gamma);
        assert_eq!(q.delta, p.delta);

        // Without leverage, gamma is fixed at zero and absent from the layout.
        let garch = VolSpec::garch();
        let g = TarchXParams::unpack(&garch, &[0.1, 0.05, 0.9, 8.0]).unwrap();
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.beta, 0.9);
    }

    #[test]
    fn persistence_uses_absolute_gamma() {
        let mut p = base_params();
        p.gamma = -0.1;
        let expected = p.alpha + p.beta + 0.05;
        assert!((p.persistence() - expected).abs() < 1e-15);
    }

    #[test]
    fn recursion_is_pure_and_bounded() {
        let spec = VolSpec::tarch();
        let returns = sample_returns();
        let cfg = TarchXConfig::default();
        let p = base_params();

        let h1 = variance_path(&p, &returns, &spec, cfg.var_floor, cfg.var_ceil);
        let h2 = variance_path(&p, &returns, &spec, cfg.var_floor, cfg.var_ceil);
        assert_eq!(h1, h2, "recursion must be deterministic");
        assert_eq!(h1.len(), returns.len());
        for &v in &h1 {
            assert!(v >= cfg.var_floor && v <= cfg.var_ceil, "sigma2 = {}", v);
        }
    }

    #[test]
    fn recursion_clips_extreme_parameters() {
        // Within-box θ at the wildest corner still yields a bounded path.
        let spec = VolSpec::tarch();
        let cfg = TarchXConfig::default();
        let p = TarchXParams {
            omega: 1e7,
            alpha: 0.5,
            gamma: 0.5,
            beta: 0.95,
            delta: vec![],
            nu: 2.1,
        };
        let returns: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 5.0 } else { -5.0 }).collect();
        let h = variance_path(&p, &returns, &spec, cfg.var_floor, cfg.var_ceil);
        for &v in &h {
            assert!((cfg.var_floor..=cfg.var_ceil).contains(&v));
        }
    }

    #[test]
    fn exogenous_terms_enter_the_recursion() {
        let returns = vec![0.1, 0.2, -0.1, 0.05];
        let dummy = ExogSeries::new("event", vec![0.0, 1.0, 0.0, 0.0]);
        let spec = VolSpec::tarchx(vec![dummy]);
        let cfg = TarchXConfig::default();
        let mut p = base_params();
        p.delta = vec![0.7];

        let mut p0 = p.clone();
        p0.delta = vec![0.0];
        let spec0 = VolSpec::tarchx(vec![ExogSeries::new("event", vec![0.0; 4])]);

        let with = variance_path(&p, &returns, &spec, cfg.var_floor, cfg.var_ceil);
        let without = variance_path(&p0, &returns, &spec0, cfg.var_floor, cfg.var_ceil);
        assert!((with[1] - without[1] - 0.7).abs() < 1e-12);
        assert!((with[2] - without[2] - 0.7 * p.beta).abs() < 1e-12);
    }

    #[test]
    fn likelihood_is_deterministic() {
        let spec = VolSpec::tarch();
        let returns = sample_returns();
        let cfg = TarchXConfig::default();
        let p = base_params();
        let a = negative_log_likelihood(&p, &returns, &spec, &cfg);
        let b = negative_log_likelihood(&p, &returns, &spec, &cfg);
        assert_eq!(a.to_bits(), b.to_bits(), "likelihood must be bit-identical");
        assert!(a.is_finite());
    }

    #[test]
    fn likelihood_never_returns_nan() {
        let spec = VolSpec::tarch();
        let returns = sample_returns();
        let cfg = TarchXConfig::default();

        let pathological = [
            TarchXParams { nu: 1.0, ..base_params() },
            TarchXParams { nu: 2.0, ..base_params() },
            TarchXParams { omega: -1.0, ..base_params() },
            TarchXParams { omega: 0.0, ..base_params() },
            TarchXParams { alpha: f64::NAN, ..base_params() },
            TarchXParams { beta: f64::INFINITY, ..base_params() },
            TarchXParams { gamma: f64::NEG_INFINITY, ..base_params() },
            TarchXParams { omega: 1e300, alpha: 0.5, gamma: 0.5, beta: 0.999, delta: vec![], nu: 50.0 },
        ];
        for p in pathological {
            let nll = negative_log_likelihood(&p, &returns, &spec, &cfg);
            assert!(nll.is_finite(), "nll must be finite, got {} for {:?}", nll, p);
        }
    }

    #[test]
    fn stationarity_constraint_slack() {
        let spec = VolSpec::tarch();
        let c = StationarityConstraint::new(0.999, &spec);
        // [omega, alpha, gamma, beta, nu]
        let feasible = [0.05, 0.05, -0.1, 0.85, 8.0];
        let infeasible = [0.05, 0.3, 0.5, 0.9, 8.0];
        assert!(c.value(&feasible) > 0.0);
        assert!(c.value(&infeasible) < 0.0);

        let garch = VolSpec::garch();
        let cg = StationarityConstraint::new(0.999, &garch);
        assert!(cg.value(&[0.05, 0.1, 0.85, 8.0]) > 0.0);
        assert!(cg.value(&[0.05, 0.3, 0.8, 8.0]) < 0.0);
    }

    #[test]
    fn empty_stationarity_region_is_rejected() {
        let spec = VolSpec::tarch();
        let cfg = TarchXConfig {
            alpha_bounds: (0.6, 0.7),
            beta_bounds: (0.5, 0.95),
            ..Default::default()
        };
        let err = cfg.validate(&spec).unwrap_err();
        assert!(err.to_string().contains("stationarity region is empty"), "{}", err);

        // Same bounds are fine once the constraint is not enforced.
        let relaxed = TarchXConfig { enforce_stationarity: false, ..cfg };
        assert!(relaxed.validate(&spec).is_ok());
    }

    #[test]
    fn default_bounds_are_feasible() {
        TarchXConfig::default().validate(&VolSpec::tarchx(vec![])).unwrap();
    }

    #[test]
    fn misaligned_regressor_is_rejected() {
        let returns = sample_returns();
        let spec = VolSpec::tarchx(vec![ExogSeries::new("event", vec![0.0; 5])]);
        let err = tarchx_fit(&returns, &spec, &TarchXConfig::default()).unwrap_err();
        assert!(err.to_string().contains("length"), "{}", err);
    }

    #[test]
    fn duplicate_regressor_names_are_rejected() {
        let returns = sample_returns();
        let spec = VolSpec::tarchx(vec![
            ExogSeries::new("event", vec![0.0; 12]),
            ExogSeries::new("event", vec![1.0; 12]),
        ]);
        let err = tarchx_fit(&returns, &spec, &TarchXConfig::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{}", err);
    }

    #[test]
    fn non_finite_returns_are_rejected() {
        let mut returns = sample_returns();
        returns[3] = f64::NAN;
        let err = tarchx_fit(&returns, &VolSpec::garch(), &TarchXConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn fit_smoke() {
        let returns = sample_returns();
        let fit = tarchx_fit(&returns, &VolSpec::tarch(), &TarchXConfig::default()).unwrap();
        assert!(fit.log_likelihood.is_finite());
        assert_eq!(fit.conditional_variance.len(), returns.len());
        assert_eq!(fit.names.len(), fit.result.parameters.len());
        assert_eq!(fit.t_stats.len(), fit.names.len());
        assert!(fit.params.omega > 0.0);
        assert!(fit.persistence < 1.0, "persistence = {}", fit.persistence);
        assert!(fit.stationary);
        assert_eq!(fit.criteria.n_obs, returns.len());
        assert_eq!(fit.criteria.n_params, 5);
        for se in &fit.result.uncertainties {
            assert!(*se >= SE_FLOOR);
        }
    }

    #[test]
    fn fit_result_serializes() {
        let returns = sample_returns();
        let fit = tarchx_fit(&returns, &VolSpec::garch(), &TarchXConfig::default()).unwrap();
        let json = serde_json::to_string(&fit).unwrap();
        let back: TarchXFit = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names, fit.names);
        assert_eq!(back.result.parameters, fit.result.parameters);
    }

    #[test]
    fn garch_nests_in_tarchx() {
        // Warm-starting TARCH from the GARCH optimum can only improve the fit.
        let returns: Vec<f64> =
            (0..100).map(|i| ((i as f64) * 0.37).sin() * 0.3 - 0.01).collect();
        let garch = tarchx_fit(&returns, &VolSpec::garch(), &TarchXConfig::default()).unwrap();
        let init = TarchXParams { gamma: 0.0, ..garch.params.clone() };
        let cfg = TarchXConfig { init: Some(init), ..Default::default() };
        let tarch = tarchx_fit(&returns, &VolSpec::tarch(), &cfg).unwrap();
        assert!(
            tarch.log_likelihood >= garch.log_likelihood - 1.0,
            "TARCH LL ({}) should not be materially worse than GARCH LL ({})",
            tarch.log_likelihood,
            garch.log_likelihood
        );
    }
}
