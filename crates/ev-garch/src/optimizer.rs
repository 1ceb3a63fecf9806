//! Optimization algorithms
//!
//! This module wraps argmin's L-BFGS in a clean interface with box bounds
//! (clamp + projected gradient) and explicit inequality constraints.
//!
//! Inequality constraints are a first-class argument of
//! [`LbfgsbOptimizer::minimize_constrained`]: every iterate is checked against
//! them before the objective is evaluated, infeasible points cost the sentinel
//! penalty, and the returned optimum is re-verified. Keeping the constraint in
//! the optimizer's signature (rather than buried inside one objective) means a
//! caller cannot define a constraint and forget to supply it to the solver.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ev_core::Result;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cost assigned to iterates that violate an inequality constraint or make the
/// objective undefined. Finite, so line searches can recover.
pub const PENALTY_NLL: f64 = 1e10;

/// Configuration for the L-BFGS-B optimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 500, tol: 1e-6, m: 10 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective (cost) evaluations.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
    /// Quasi-Newton inverse-curvature estimate (row-major N×N), when the
    /// backend exposes one. The bundled argmin L-BFGS backend does not, so
    /// this is `None` unless populated by an alternative solver; inference
    /// code selects the cheap covariance path by its availability.
    pub inverse_curvature: Option<Vec<f64>>,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

/// Objective function trait for optimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Compute gradient at given parameters (numerical if not overridden)
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        // Central differences with adaptive step size
        let n = params.len();
        let mut grad = vec![0.0; n];

        for i in 0..n {
            let eps = 1e-8 * params[i].abs().max(1.0);

            let mut params_plus = params.to_vec();
            params_plus[i] += eps;
            let f_plus = self.eval(&params_plus)?;

            let mut params_minus = params.to_vec();
            params_minus[i] -= eps;
            let f_minus = self.eval(&params_minus)?;

            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }

        Ok(grad)
    }
}

/// A scalar inequality constraint `g(θ) ≥ 0`.
///
/// Feasible iff [`InequalityConstraint::value`] is non-negative.
pub trait InequalityConstraint: Send + Sync {
    /// Constraint slack at `params`; negative means infeasible.
    fn value(&self, params: &[f64]) -> f64;

    /// Short name used in termination messages.
    fn name(&self) -> &str {
        "inequality"
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

fn feasible(params: &[f64], constraints: &[&dyn InequalityConstraint]) -> bool {
    constraints.iter().all(|c| c.value(params) >= 0.0)
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Wrapper making an [`ObjectiveFunction`] + bounds + constraints compatible
/// with argmin.
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    constraints: &'a [&'a dyn InequalityConstraint],
    counts: Arc<FuncCounts>,
}

impl ArgminProblem<'_> {
    fn penalized_eval(&self, clamped: &[f64]) -> Result<f64> {
        if !feasible(clamped, self.constraints) {
            return Ok(PENALTY_NLL);
        }
        self.objective.eval(clamped)
    }
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.penalized_eval(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);

        let mut g = if feasible(&clamped, self.constraints) {
            self.objective
                .gradient(&clamped)
                .map_err(|e| argmin::core::Error::msg(e.to_string()))?
        } else {
            // Inside the penalized region the surface is flat; differentiate the
            // penalized cost numerically so the line search backs off instead of
            // stepping through the sentinel wall.
            let n = clamped.len();
            let mut grad = vec![0.0; n];
            for i in 0..n {
                let eps = 1e-8 * clamped[i].abs().max(1.0);
                let mut pp = clamped.clone();
                pp[i] += eps;
                let fp =
                    self.penalized_eval(&pp).map_err(|e| argmin::core::Error::msg(e.to_string()))?;
                pp[i] = clamped[i] - eps;
                let fm =
                    self.penalized_eval(&pp).map_err(|e| argmin::core::Error::msg(e.to_string()))?;
                grad[i] = (fp - fm) / (2.0 * eps);
            }
            grad
        };

        // Projected-gradient heuristic: if we are at a bound and the gradient
        // would push further outside, zero that component so the line search
        // does not repeatedly step into flat clamped regions.
        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }

        Ok(g)
    }
}

/// L-BFGS-B optimizer with box bounds and explicit inequality constraints
pub struct LbfgsbOptimizer {
    config: OptimizerConfig,
}

impl LbfgsbOptimizer {
    /// Create new optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize objective function with box bounds only.
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        self.minimize_constrained(objective, init_params, bounds, &[])
    }

    /// Minimize objective function with box bounds and inequality constraints.
    ///
    /// # Arguments
    /// * `objective` - Objective function to minimize
    /// * `init_params` - Initial parameter values; must be feasible after clamping
    /// * `bounds` - Parameter bounds as (lower, upper) for each parameter
    /// * `constraints` - Inequality constraints `g(θ) ≥ 0`, enforced at every iterate
    ///
    /// Infeasible iterates are charged [`PENALTY_NLL`]; if the best point the
    /// solver returns still violates a constraint, the result is marked
    /// non-converged rather than silently accepted.
    pub fn minimize_constrained(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
        constraints: &[&dyn InequalityConstraint],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(ev_core::Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }

        let init_clamped = clamp_params(init_params, bounds);
        if let Some(c) = constraints.iter().find(|c| c.value(&init_clamped) < 0.0) {
            return Err(ev_core::Error::Validation(format!(
                "Initial point violates '{}' constraint (slack = {:.3e})",
                c.name(),
                c.value(&init_clamped)
            )));
        }

        let counts = Arc::new(FuncCounts::default());
        let problem =
            ArgminProblem { objective, bounds, constraints, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // Argmin's default cost tolerance is ~EPS, which is too strict for NLL
        // scales and leads to unnecessary max-iter terminations.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| {
                ev_core::Error::Validation(format!("Invalid optimizer configuration (tol): {e}"))
            })?;
        let solver = solver.with_tolerance_cost(tol_cost).map_err(|e| {
            ev_core::Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
        })?;

        let init_for_solver = init_clamped.clone();
        let res = match Executor::new(problem, solver)
            .configure(|state| state.param(init_for_solver).max_iters(self.config.max_iter))
            .run()
        {
            Ok(res) => res,
            Err(e) => {
                // A solver abort (typically a line-search failure against the
                // penalty wall) is a soft non-convergence, not a structural
                // error: report the starting point so batch callers can flag
                // or retry this fit without losing the others.
                log::warn!("solver aborted: {e}");
                let fval = objective.eval(&init_clamped).unwrap_or(PENALTY_NLL);
                return Ok(OptimizationResult {
                    parameters: init_clamped,
                    fval,
                    n_iter: 0,
                    n_fev: counts.cost.load(Ordering::Relaxed),
                    n_gev: counts.grad.load(Ordering::Relaxed),
                    converged: false,
                    message: format!("solver aborted: {e}"),
                    inverse_curvature: None,
                });
            }
        };

        let state = res.state();
        let best_params_unclamped = state
            .get_best_param()
            .ok_or_else(|| ev_core::Error::Computation("No best parameters found".to_string()))?
            .clone();
        let best_params = clamp_params(&best_params_unclamped, bounds);
        let fval = state.get_best_cost();
        let n_iter = state.get_iter();
        let n_fev = counts.cost.load(Ordering::Relaxed);
        let n_gev = counts.grad.load(Ordering::Relaxed);

        let termination = state.get_termination_status();
        let mut converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        let mut message = termination.to_string();

        // A converged-but-infeasible optimum would invalidate every downstream
        // use of the estimates; demote it to a soft failure.
        if let Some(c) = constraints.iter().find(|c| c.value(&best_params) < 0.0) {
            converged = false;
            message = format!("{} (optimum violates '{}' constraint)", message, c.name());
        }

        Ok(OptimizationResult {
            parameters: best_params,
            fval,
            n_iter,
            n_fev,
            n_gev,
            converged,
            message,
            inverse_curvature: None,
        })
    }
}

impl Default for LbfgsbOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}
