//! Information criteria and model ranking.
//!
//! Every fit reports `k`, `n`, and `ln L` so an external comparison step can
//! rank nested variants (GARCH / TARCH / TARCH-X) per asset; the ranking
//! helpers here implement the standard ordering and exclude non-converged
//! fits rather than silently including garbage estimates.

use serde::{Deserialize, Serialize};

use crate::tarchx::TarchXFit;

/// Akaike information criterion: `2k − 2·ln L`.
pub fn aic(log_likelihood: f64, n_params: usize) -> f64 {
    2.0 * n_params as f64 - 2.0 * log_likelihood
}

/// Bayesian information criterion: `k·ln(n) − 2·ln L`.
pub fn bic(log_likelihood: f64, n_params: usize, n_obs: usize) -> f64 {
    n_params as f64 * (n_obs as f64).ln() - 2.0 * log_likelihood
}

/// Information criteria at the optimum, with the inputs they were computed
/// from so a comparison collaborator never has to re-derive `k` or `n`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InformationCriteria {
    /// Log-likelihood at the optimum.
    pub log_likelihood: f64,
    /// Parameter count, including ν.
    pub n_params: usize,
    /// Sample size.
    pub n_obs: usize,
    /// Akaike information criterion.
    pub aic: f64,
    /// Bayesian information criterion.
    pub bic: f64,
}

impl InformationCriteria {
    /// Compute both criteria.
    pub fn new(log_likelihood: f64, n_params: usize, n_obs: usize) -> Self {
        Self {
            log_likelihood,
            n_params,
            n_obs,
            aic: aic(log_likelihood, n_params),
            bic: bic(log_likelihood, n_params, n_obs),
        }
    }
}

fn rank_by<F: Fn(&TarchXFit) -> f64>(fits: &[TarchXFit], key: F) -> Vec<usize> {
    let mut idx: Vec<usize> = Vec::with_capacity(fits.len());
    for (i, fit) in fits.iter().enumerate() {
        if fit.converged() {
            idx.push(i);
        } else {
            log::warn!("excluding non-converged fit #{} from ranking ({})", i, fit.message);
        }
    }
    idx.sort_by(|&a, &b| {
        key(&fits[a])
            .partial_cmp(&key(&fits[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    idx
}

/// Indices of converged fits, best (lowest) AIC first.
pub fn rank_by_aic(fits: &[TarchXFit]) -> Vec<usize> {
    rank_by(fits, |f| f.criteria.aic)
}

/// Indices of converged fits, best (lowest) BIC first.
pub fn rank_by_bic(fits: &[TarchXFit]) -> Vec<usize> {
    rank_by(fits, |f| f.criteria.bic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tarchx::{TarchXConfig, VolSpec, tarchx_fit};

    #[test]
    fn criteria_arithmetic() {
        // ln L = -100, k = 5, n = 500
        let ic = InformationCriteria::new(-100.0, 5, 500);
        assert!((ic.aic - 210.0).abs() < 1e-12);
        let expected_bic = 5.0 * 500.0_f64.ln() + 200.0;
        assert!((ic.bic - expected_bic).abs() < 1e-12);
        assert_eq!(ic.n_params, 5);
        assert_eq!(ic.n_obs, 500);
    }

    #[test]
    fn bic_penalizes_harder_for_large_samples() {
        let small = InformationCriteria::new(-100.0, 5, 10);
        let large = InformationCriteria::new(-100.0, 5, 10_000);
        assert!(large.bic > small.bic);
        assert!((small.aic - large.aic).abs() < 1e-12);
    }

    #[test]
    fn ranking_orders_by_criterion_and_drops_non_converged() {
        let returns =
            vec![0.1, -0.2, 0.05, 0.3, -0.15, 0.02, 0.01, -0.4, 0.35, -0.1, 0.05, -0.02];
        let cfg = TarchXConfig::default();
        let mut fits = vec![
            tarchx_fit(&returns, &VolSpec::garch(), &cfg).unwrap(),
            tarchx_fit(&returns, &VolSpec::tarch(), &cfg).unwrap(),
        ];
        // Force a deterministic ordering scenario: pretend fit 0 is better and
        // fit 1 never converged.
        fits[0].criteria.aic = 10.0;
        fits[1].criteria.aic = 5.0;
        fits[1].result.converged = false;
        fits[0].result.converged = true;

        let order = rank_by_aic(&fits);
        assert_eq!(order, vec![0], "non-converged fit must be excluded");
    }
}
