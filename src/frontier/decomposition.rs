//! frontier::decomposition — splitting composed residuals into noise and
//! inefficiency.
//!
//! Both the stochastic frontier and StoNED model a residual as
//! `ε = v − s·u` with symmetric noise `v ~ N(0, σ_v²)` and one-sided
//! inefficiency `u ≥ 0`, where `s = +1` for production and `−1` for cost
//! frontiers. This module holds the pieces they share:
//!
//! - [`method_of_moments`]: `σ_u`, `σ_v` from the second and third central
//!   moments of mean-zero residuals (half-normal `u`).
//! - [`conditional_mean`]: the JLMS point estimate `E[u | ε]`.
//!
//! Degenerate decompositions are not errors. Residuals skewed the wrong
//! way imply `σ_u = 0` (every DMU on the frontier); a third moment too large
//! for the second implies `σ_v = 0` (every deviation is inefficiency).
use crate::frontier::errors::{EstimatorError, EstimatorResult};
use crate::frontier::options::FrontierOrientation;
use crate::optimization::numerical_stability::{
    half_normal_mean_factor, inverse_mills, VARIANCE_FLOOR,
};
use crate::utils::central_moments;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceComponents {
    pub sigma_u: f64,
    pub sigma_v: f64,
}

impl VarianceComponents {
    /// `E[u] = σ_u √(2/π)` for half-normal inefficiency.
    pub fn mean_inefficiency(&self) -> f64 {
        self.sigma_u * half_normal_mean_factor()
    }
}

/// Moment estimator of the half-normal decomposition.
///
/// With `m2`, `m3` the central moments of the residuals,
/// `σ_u³ = m3 / (s·√(2/π)·(1 − 4/π))` and
/// `σ_v² = m2 − (1 − 2/π)·σ_u²`.
///
/// # Errors
/// [`EstimatorError::InsufficientDmus`] for an empty residual vector.
pub fn method_of_moments(
    residuals: &[f64], orientation: FrontierOrientation,
) -> EstimatorResult<VarianceComponents> {
    let (m2, m3) = central_moments(residuals)
        .ok_or(EstimatorError::InsufficientDmus { required: 1, found: 0 })?;
    let denom = orientation.sign() * half_normal_mean_factor() * (1.0 - 4.0 / PI);
    let sigma_u3 = m3 / denom;
    if sigma_u3 <= 0.0 || !sigma_u3.is_finite() {
        warn!(m3, ?orientation, "residual skewness has the wrong sign; inefficiency set to zero");
        return Ok(VarianceComponents { sigma_u: 0.0, sigma_v: m2.max(0.0).sqrt() });
    }
    let sigma_u = sigma_u3.cbrt();
    let sigma_v2 = m2 - (1.0 - 2.0 / PI) * sigma_u * sigma_u;
    if sigma_v2 <= VARIANCE_FLOOR {
        warn!(m2, sigma_u, "third moment exceeds what the variance allows; noise set to zero");
        return Ok(VarianceComponents { sigma_u, sigma_v: 0.0 });
    }
    Ok(VarianceComponents { sigma_u, sigma_v: sigma_v2.sqrt() })
}

/// JLMS conditional mean `E[u | ε]` for `u ~ N⁺(μ, σ_u²)`.
///
/// `epsilon` is the full composed error `v − s·u` (not mean-centered).
/// `mu = 0` gives the half-normal case. Degenerate components collapse to
/// their limits: no inefficiency gives `0`, no noise gives `max(−s·ε, 0)`.
pub fn conditional_mean(epsilon: f64, sigma_u: f64, sigma_v: f64, mu: f64, sign: f64) -> f64 {
    let su2 = sigma_u * sigma_u;
    let sv2 = sigma_v * sigma_v;
    if su2 <= VARIANCE_FLOOR {
        return 0.0;
    }
    if sv2 <= VARIANCE_FLOOR {
        return (-sign * epsilon).max(0.0);
    }
    let s2 = su2 + sv2;
    let mu_star = (mu * sv2 - sign * epsilon * su2) / s2;
    let sigma_star = sigma_u * sigma_v / s2.sqrt();
    (mu_star + sigma_star * inverse_mills(mu_star / sigma_star)).max(0.0)
}
