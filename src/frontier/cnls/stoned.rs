//! StoNED variance decomposition of CNLS residuals.
//!
//! The CNLS residuals `ε̂` estimate `v − s·u` up to the location shift
//! `−s·E[u]`. Two estimators recover `(σ_u, σ_v)` from them:
//!
//! - [`VarianceEstimator::MethodOfMoments`]: the closed form in
//!   [`method_of_moments`].
//! - [`VarianceEstimator::QuasiLikelihood`]: profile the composed-error
//!   likelihood over `λ = σ_u/σ_v` alone, with `σ` pinned by the second
//!   moment,
//!
//!   `σ² = m2 / (1 − 2λ²/(π(1 + λ²)))`,
//!   `μ = √(2/π)·σλ/√(1 + λ²)`,
//!   `ε_i = ε̂_i − s·μ`,
//!   `ℓ(λ) = −n ln σ + Σ ln Φ(−s ε_i λ/σ) − Σ ε_i²/(2σ²)`.
//!
//! `λ` is optimized as `softplus(θ)` so the search is unconstrained.
use crate::frontier::{
    decomposition::{method_of_moments, VarianceComponents},
    errors::{EstimatorError, EstimatorResult},
    options::FrontierOrientation,
};
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{maximize, validation::validate_theta, Cost, LogLikelihood, MLEOptions, Theta},
    numerical_stability::{safe_softplus, safe_softplus_inv, std_normal_ln_cdf, VARIANCE_FLOOR},
};
use crate::utils::central_moments;
use ndarray::{array, Array1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;
use tracing::{debug, warn};

/// Starting `λ` is clamped into this range.
const LAMBDA_START_RANGE: (f64, f64) = (0.1, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceEstimator {
    MethodOfMoments,
    #[default]
    QuasiLikelihood,
}

impl FromStr for VarianceEstimator {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mom" | "moments" => Ok(VarianceEstimator::MethodOfMoments),
            "qle" | "quasi" => Ok(VarianceEstimator::QuasiLikelihood),
            _ => Err(EstimatorError::InvalidConfig {
                reason: format!("unknown variance estimator '{s}', expected 'mom' or 'qle'"),
            }),
        }
    }
}

/// Mean-centered residuals with their second moment and orientation sign.
#[derive(Debug, Clone)]
pub struct StonedData {
    pub residuals: Array1<f64>,
    pub m2: f64,
    pub sign: f64,
}

impl StonedData {
    fn centered(residuals: &[f64], m2: f64, sign: f64) -> Self {
        let centre = residuals.iter().sum::<f64>() / residuals.len() as f64;
        Self { residuals: residuals.iter().map(|e| e - centre).collect(), m2, sign }
    }

    fn sigma_and_shift(&self, lambda: f64) -> (f64, f64) {
        let l2 = lambda * lambda;
        let s2 = self.m2 / (1.0 - 2.0 * l2 / (PI * (1.0 + l2)));
        let sigma = s2.sqrt();
        let mu = (2.0 / PI).sqrt() * sigma * lambda / (1.0 + l2).sqrt();
        (sigma, mu)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuasiLogLik;

impl LogLikelihood for QuasiLogLik {
    type Data = StonedData;

    fn value(&self, theta: &Theta, data: &StonedData) -> OptResult<Cost> {
        let lambda = safe_softplus(theta[0]);
        let (sigma, mu) = data.sigma_and_shift(lambda);
        let n = data.residuals.len() as f64;
        let (tail, square) = data.residuals.iter().fold((0.0, 0.0), |(tail, square), &e| {
            let eps = e - data.sign * mu;
            (tail + std_normal_ln_cdf(-data.sign * eps * lambda / sigma), square + eps * eps)
        });
        let ll = -n * sigma.ln() + tail - square / (2.0 * sigma * sigma);
        if !ll.is_finite() {
            return Err(OptError::NonFiniteCost { value: ll });
        }
        Ok(ll)
    }

    fn check(&self, theta: &Theta, data: &StonedData) -> OptResult<()> {
        if data.m2.is_nan() || data.m2 <= VARIANCE_FLOOR {
            return Err(OptError::InvalidData {
                reason: format!("residual variance {} is not positive", data.m2),
            });
        }
        validate_theta(theta, 1)
    }
}

/// Recover `(σ_u, σ_v)` from CNLS residuals.
///
/// # Errors
/// - [`EstimatorError::InsufficientDmus`] for an empty residual vector.
/// - [`EstimatorError::Optimization`] when the quasi-likelihood cannot be
///   maximized.
pub fn decompose(
    residuals: &[f64], orientation: FrontierOrientation, estimator: VarianceEstimator,
    mle: &MLEOptions,
) -> EstimatorResult<VarianceComponents> {
    let moments = method_of_moments(residuals, orientation)?;
    if estimator == VarianceEstimator::MethodOfMoments {
        return Ok(moments);
    }

    let (m2, _) = central_moments(residuals)
        .ok_or(EstimatorError::InsufficientDmus { required: 1, found: 0 })?;
    if m2 <= VARIANCE_FLOOR {
        warn!(m2, "CNLS residuals have no spread; every DMU is on the frontier");
        return Ok(VarianceComponents { sigma_u: 0.0, sigma_v: 0.0 });
    }

    let data = StonedData::centered(residuals, m2, orientation.sign());
    let lambda0 = starting_lambda(&moments);

    let outcome = maximize(&QuasiLogLik, array![safe_softplus_inv(lambda0)], &data, mle)?;
    if !outcome.converged {
        warn!(status = %outcome.status, "StoNED quasi-likelihood did not report convergence");
    }
    let lambda = safe_softplus(outcome.theta_hat[0]);
    let (sigma, _) = data.sigma_and_shift(lambda);
    let root = (1.0 + lambda * lambda).sqrt();
    debug!(lambda, sigma, lambda0, "StoNED quasi-likelihood estimate");
    Ok(VarianceComponents { sigma_u: sigma * lambda / root, sigma_v: sigma / root })
}

/// Moment-based `λ`, clamped to [`LAMBDA_START_RANGE`]; `1` when either
/// component vanished.
fn starting_lambda(moments: &VarianceComponents) -> f64 {
    if moments.sigma_u > 0.0 && moments.sigma_v > 0.0 {
        (moments.sigma_u / moments.sigma_v).clamp(LAMBDA_START_RANGE.0, LAMBDA_START_RANGE.1)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Cost-type residuals: symmetric noise plus a right-skewed
    /// inefficiency component, centered.
    fn skewed_residuals(n: usize) -> Vec<f64> {
        let raw: Vec<f64> = (0..n)
            .map(|i| {
                let v = 0.05 * ((i * 7 % 11) as f64 - 5.0) / 5.0;
                let u = 0.4 * ((i * 5 % 13) as f64 / 12.0).powi(3);
                v + u
            })
            .collect();
        let m = raw.iter().sum::<f64>() / n as f64;
        raw.into_iter().map(|r| r - m).collect()
    }

    #[test]
    // Purpose
    // -------
    // The quasi-likelihood estimate reproduces the residual variance through
    // `σ_v² + (1 − 2/π)σ_u² = m2`, whatever λ it settles on.
    //
    // Given
    // -----
    // - 60 right-skewed residuals, cost orientation.
    //
    // Expect
    // ------
    // - Positive σ_u and σ_v that satisfy the variance identity.
    // - λ̂ = σ_u/σ_v moved away from the moment-based start and strictly
    //   improves the quasi-likelihood over it.
    fn quasi_likelihood_preserves_residual_variance() {
        // Arrange
        let residuals = skewed_residuals(60);
        let (m2, _) = central_moments(&residuals).unwrap();
        let lambda0 = starting_lambda(
            &method_of_moments(&residuals, FrontierOrientation::Cost).expect("moments"),
        );
        let data = StonedData::centered(&residuals, m2, FrontierOrientation::Cost.sign());
        let ll = |lambda: f64| QuasiLogLik.value(&array![safe_softplus_inv(lambda)], &data).unwrap();

        // Act
        let vc = decompose(
            &residuals,
            FrontierOrientation::Cost,
            VarianceEstimator::QuasiLikelihood,
            &MLEOptions::default(),
        )
        .expect("QLE decomposition");

        // Assert
        assert!(vc.sigma_u > 0.0 && vc.sigma_v > 0.0);
        assert_relative_eq!(
            vc.sigma_v.powi(2) + (1.0 - 2.0 / PI) * vc.sigma_u.powi(2),
            m2,
            max_relative = 1e-8
        );
        let lambda_hat = vc.sigma_u / vc.sigma_v;
        assert!((lambda_hat - lambda0).abs() > 1e-4, "λ̂ = {lambda_hat}, λ₀ = {lambda0}");
        assert!(ll(lambda_hat) > ll(lambda0), "ℓ(λ̂) = {}, ℓ(λ₀) = {}", ll(lambda_hat), ll(lambda0));
    }

    #[test]
    // Purpose
    // -------
    // Zero-spread residuals are a degenerate decomposition, not an error.
    fn zero_spread_residuals_give_zero_components() {
        let vc = decompose(
            &[0.0; 8],
            FrontierOrientation::Production,
            VarianceEstimator::QuasiLikelihood,
            &MLEOptions::default(),
        )
        .expect("degenerate decomposition");

        assert_eq!(vc, VarianceComponents { sigma_u: 0.0, sigma_v: 0.0 });
    }

    #[test]
    // Purpose
    // -------
    // The quasi-likelihood prefers a larger λ for strongly skewed residuals
    // than for nearly symmetric ones.
    fn quasi_likelihood_orders_by_skewness() {
        let data = StonedData {
            residuals: Array1::from(skewed_residuals(60)),
            m2: central_moments(&skewed_residuals(60)).unwrap().0,
            sign: -1.0,
        };
        let flipped = StonedData { sign: 1.0, ..data.clone() };
        let at = |d: &StonedData, l: f64| QuasiLogLik.value(&array![safe_softplus_inv(l)], d).unwrap();

        assert!(at(&data, 2.0) > at(&flipped, 2.0));
    }

    #[test]
    // Purpose
    // -------
    // Estimator names parse case-insensitively.
    fn variance_estimator_parses_short_names() {
        assert_eq!("MoM".parse::<VarianceEstimator>(), Ok(VarianceEstimator::MethodOfMoments));
        assert_eq!("qle".parse::<VarianceEstimator>(), Ok(VarianceEstimator::QuasiLikelihood));
        assert!("ml".parse::<VarianceEstimator>().is_err());
    }
}
