//! Parallel fitting across independent (asset, specification) pairs.
//!
//! Each fit is a stateless, CPU-bound computation with its own arrays, so the
//! batch is embarrassingly parallel. Per-asset failures are captured in the
//! returned records: five successes and one failure come back as exactly
//! that, never as an aborted batch.

use rayon::prelude::*;

use crate::tarchx::{TarchXConfig, TarchXFit, VolSpec, tarchx_fit};

/// One fit request: a named asset's return series plus the model
/// specification to fit on it.
#[derive(Debug, Clone)]
pub struct FitRequest {
    /// Asset label carried through to the result record.
    pub name: String,
    /// Daily percentage log-returns.
    pub returns: Vec<f64>,
    /// Variance specification (GARCH / TARCH / TARCH-X).
    pub spec: VolSpec,
}

/// Outcome of one batch element.
#[derive(Debug)]
pub struct FitRecord {
    /// Asset label from the request.
    pub name: String,
    /// The fit, or the structural error that prevented it. Soft
    /// non-convergence is *not* an `Err` here; check
    /// [`TarchXFit::converged`] on the success arm.
    pub fit: ev_core::Result<TarchXFit>,
}

/// Fit every request with a shared configuration, in parallel.
pub fn fit_batch(requests: &[FitRequest], cfg: &TarchXConfig) -> Vec<FitRecord> {
    requests
        .par_iter()
        .map(|req| FitRecord {
            name: req.name.clone(),
            fit: tarchx_fit(&req.returns, &req.spec, cfg),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn returns() -> Vec<f64> {
        vec![0.1, -0.2, 0.05, 0.3, -0.15, 0.02, 0.01, -0.4, 0.35, -0.1, 0.05, -0.02]
    }

    #[test]
    fn one_bad_asset_does_not_abort_the_rest() {
        let mut broken = returns();
        broken[5] = f64::NAN;
        let requests = vec![
            FitRequest { name: "btc".into(), returns: returns(), spec: VolSpec::tarch() },
            FitRequest { name: "bad".into(), returns: broken, spec: VolSpec::tarch() },
            FitRequest { name: "eth".into(), returns: returns(), spec: VolSpec::garch() },
        ];

        let records = fit_batch(&requests, &TarchXConfig::default());
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "btc");
        assert!(records[0].fit.is_ok());
        assert!(records[1].fit.is_err(), "NaN input must fail that asset only");
        assert!(records[2].fit.is_ok());
    }

    #[test]
    fn results_keep_request_order() {
        let requests: Vec<FitRequest> = (0..8)
            .map(|i| FitRequest {
                name: format!("asset-{i}"),
                returns: returns(),
                spec: VolSpec::garch(),
            })
            .collect();
        let records = fit_batch(&requests, &TarchXConfig::default());
        for (i, rec) in records.iter().enumerate() {
            assert_eq!(rec.name, format!("asset-{i}"));
        }
    }
}
