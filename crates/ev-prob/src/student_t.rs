//! Student-t distribution utilities.

use ev_core::{Error, Result};
use statrs::function::gamma::ln_gamma;

/// Natural log of π.
const LN_PI: f64 = 1.144_729_885_849_400_2;

/// Log-PDF of a Student-t distribution at `x` with location `mu`, scale `sigma`, and dof `nu`.
pub fn logpdf(x: f64, mu: f64, sigma: f64, nu: f64) -> Result<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::Validation(format!("sigma must be finite and > 0, got {}", sigma)));
    }
    if !nu.is_finite() || nu <= 0.0 {
        return Err(Error::Validation(format!("nu must be finite and > 0, got {}", nu)));
    }

    let z = (x - mu) / sigma;
    let half_nu = 0.5 * nu;
    let a = ln_gamma(0.5 * (nu + 1.0)) - ln_gamma(half_nu);
    let b = -0.5 * (nu.ln() + LN_PI);
    let c = -sigma.ln();
    let d = -0.5 * (nu + 1.0) * (z * z / nu).ln_1p();
    Ok(a + b + c + d)
}

/// Standardized Student-t density: zero mean, **unit variance**, `nu > 2`.
///
/// GARCH-family likelihoods evaluate the same ν at every observation, so the
/// ν-dependent log-gamma normalization is computed once here and the
/// per-observation cost reduces to one `ln` and one `ln_1p`.
#[derive(Debug, Clone, Copy)]
pub struct StandardizedT {
    nu: f64,
    ln_norm: f64,
    half_nu_p1: f64,
    nu_m2: f64,
}

impl StandardizedT {
    /// Build the density for `nu` degrees of freedom. Requires `nu > 2` so the
    /// variance is finite and the unit-variance rescaling is defined.
    pub fn new(nu: f64) -> Result<Self> {
        if !nu.is_finite() || nu <= 2.0 {
            return Err(Error::Validation(format!("nu must be finite and > 2, got {}", nu)));
        }
        let nu_m2 = nu - 2.0;
        let ln_norm = ln_gamma(0.5 * (nu + 1.0)) - ln_gamma(0.5 * nu) - 0.5 * (LN_PI + nu_m2.ln());
        Ok(Self { nu, ln_norm, half_nu_p1: 0.5 * (nu + 1.0), nu_m2 })
    }

    /// Degrees of freedom.
    pub fn nu(&self) -> f64 {
        self.nu
    }

    /// Log-density of an observation `x` whose conditional variance is `sigma2`.
    ///
    /// Equivalent to [`logpdf`] at scale `sqrt(sigma2·(ν−2)/ν)`, but without
    /// re-deriving the normalization. `sigma2` must be finite and positive;
    /// callers in optimizer hot loops guarantee this by clipping the variance
    /// path first.
    #[inline]
    pub fn logpdf(&self, x: f64, sigma2: f64) -> f64 {
        let z2 = x * x / sigma2;
        self.ln_norm - 0.5 * sigma2.ln() - self.half_nu_p1 * (z2 / self.nu_m2).ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cauchy_at_zero() {
        // nu=1 => Cauchy(0,1): pdf(0) = 1/pi
        let lp = logpdf(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!((lp + std::f64::consts::PI.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry() {
        let lp1 = logpdf(1.3, 0.0, 2.0, 5.0).unwrap();
        let lp2 = logpdf(-1.3, 0.0, 2.0, 5.0).unwrap();
        assert!((lp1 - lp2).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        assert!(logpdf(0.0, 0.0, 0.0, 5.0).is_err());
        assert!(logpdf(0.0, 0.0, 1.0, 0.0).is_err());
        assert!(StandardizedT::new(2.0).is_err());
        assert!(StandardizedT::new(f64::NAN).is_err());
    }

    #[test]
    fn test_standardized_matches_general_logpdf() {
        // Standardized-t at variance sigma2 is the general t at scale
        // sqrt(sigma2 * (nu-2)/nu).
        let nu = 7.5;
        let st = StandardizedT::new(nu).unwrap();
        for &(x, sigma2) in &[(0.0, 1.0), (1.2, 0.5), (-3.1, 4.0), (0.25, 1e-6)] {
            let scale = (sigma2 * (nu - 2.0) / nu).sqrt();
            let reference = logpdf(x, 0.0, scale, nu).unwrap();
            assert_relative_eq!(st.logpdf(x, sigma2), reference, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_standardized_unit_variance_normalization() {
        // Numerically integrate x^2 f(x) over a wide grid; should be close to 1.
        let st = StandardizedT::new(8.0).unwrap();
        let mut second_moment = 0.0;
        let dx = 1e-3;
        let mut x = -60.0;
        while x < 60.0 {
            second_moment += x * x * st.logpdf(x, 1.0).exp() * dx;
            x += dx;
        }
        assert!((second_moment - 1.0).abs() < 1e-3, "E[x^2] = {}", second_moment);
    }

    #[test]
    fn test_large_nu_stays_finite() {
        // ln_gamma keeps the normalization finite where naive log(gamma(x)) overflows.
        let st = StandardizedT::new(50.0).unwrap();
        let lp = st.logpdf(0.5, 2.0);
        assert!(lp.is_finite());
    }
}
