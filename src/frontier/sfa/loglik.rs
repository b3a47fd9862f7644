//! frontier::sfa::loglik — composed-error likelihood for the native backend.
//!
//! Model: `ln y_i = z_i·β + v_i − s·u_i` with `v ~ N(0, σ_v²)` and
//! `u ~ N⁺(μ, σ_u²)` (half-normal when `μ = 0`).
//!
//! Parameter layout in `θ`:
//! `(β_0, …, β_k, ln σ_u², ln σ_v² [, μ])`, the trailing `μ` only for the
//! truncated-normal distribution.
//!
//! Per-observation log density, with `σ² = σ_u² + σ_v²`,
//! `μ*_i = (μσ_v² − sε_iσ_u²)/σ²` and `σ* = σ_uσ_v/σ`:
//!
//! `ℓ_i = −ln√(2π) − ln σ − ln Φ(μ/σ_u) + ln Φ(μ*_i/σ*) − (ε_i + sμ)²/(2σ²)`.
use crate::frontier::errors::{EstimatorError, EstimatorResult};
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{validation::validate_theta, Cost, LogLikelihood, Theta},
    numerical_stability::std_normal_ln_cdf,
};
use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array1, Array2};

/// Cholesky pivots smaller than this fraction of the largest mark the
/// design as numerically singular.
const SINGULAR_PIVOT_RATIO: f64 = 1e-7;

/// Log-variances are clamped to `±LOG_VARIANCE_BOUND` during evaluation.
const LOG_VARIANCE_BOUND: f64 = 30.0;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Owned likelihood data: response, design with intercept column, sign.
#[derive(Debug, Clone)]
pub struct SfaData {
    pub y: Array1<f64>,
    pub z: Array2<f64>,
    pub sign: f64,
    pub truncated: bool,
}

impl SfaData {
    /// Prepend an intercept column to the regressors.
    pub fn new(y: Array1<f64>, x: &Array2<f64>, sign: f64, truncated: bool) -> Self {
        let mut z = Array2::<f64>::ones((x.nrows(), x.ncols() + 1));
        z.slice_mut(s![.., 1..]).assign(x);
        Self { y, z, sign, truncated }
    }

    pub fn n_coefficients(&self) -> usize {
        self.z.ncols()
    }

    pub fn n_params(&self) -> usize {
        self.z.ncols() + 2 + usize::from(self.truncated)
    }

    pub fn residuals(&self, beta: &Array1<f64>) -> Array1<f64> {
        &self.y - &self.z.dot(beta)
    }
}

/// Structural parameters decoded from `θ`.
#[derive(Debug, Clone, PartialEq)]
pub struct SfaParams {
    pub beta: Array1<f64>,
    pub sigma_u: f64,
    pub sigma_v: f64,
    pub mu: f64,
}

impl SfaParams {
    pub fn from_theta(theta: &Theta, data: &SfaData) -> Self {
        let k = data.n_coefficients();
        let bound = |v: f64| v.clamp(-LOG_VARIANCE_BOUND, LOG_VARIANCE_BOUND);
        Self {
            beta: theta.slice(s![..k]).to_owned(),
            sigma_u: (0.5 * bound(theta[k])).exp(),
            sigma_v: (0.5 * bound(theta[k + 1])).exp(),
            mu: if data.truncated { theta[k + 2] } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SfaLogLik;

impl LogLikelihood for SfaLogLik {
    type Data = SfaData;

    fn value(&self, theta: &Theta, data: &SfaData) -> OptResult<Cost> {
        let p = SfaParams::from_theta(theta, data);
        let (su2, sv2) = (p.sigma_u * p.sigma_u, p.sigma_v * p.sigma_v);
        let s2 = su2 + sv2;
        let sigma = s2.sqrt();
        let sigma_star = p.sigma_u * p.sigma_v / sigma;
        let constant = -LN_SQRT_2PI - sigma.ln() - std_normal_ln_cdf(p.mu / p.sigma_u);

        let ll: f64 = data
            .residuals(&p.beta)
            .iter()
            .map(|&eps| {
                let mu_star = (p.mu * sv2 - data.sign * eps * su2) / s2;
                let centered = eps + data.sign * p.mu;
                constant + std_normal_ln_cdf(mu_star / sigma_star) - centered * centered / (2.0 * s2)
            })
            .sum();
        if !ll.is_finite() {
            return Err(OptError::NonFiniteCost { value: ll });
        }
        Ok(ll)
    }

    fn check(&self, theta: &Theta, data: &SfaData) -> OptResult<()> {
        if data.y.len() != data.z.nrows() {
            return Err(OptError::InvalidData {
                reason: format!("{} responses for {} design rows", data.y.len(), data.z.nrows()),
            });
        }
        validate_theta(theta, data.n_params())
    }
}

/// OLS coefficients via the normal equations.
///
/// # Errors
/// [`EstimatorError::SingularDesign`] when `ZᵀZ` is not positive definite.
pub fn ols(data: &SfaData) -> EstimatorResult<Array1<f64>> {
    let (n, k) = data.z.dim();
    let z = DMatrix::from_fn(n, k, |i, j| data.z[[i, j]]);
    let y = DVector::from_iterator(n, data.y.iter().copied());
    let ztz = z.transpose() * &z;
    let zty = z.transpose() * y;
    let chol = ztz.cholesky().ok_or(EstimatorError::SingularDesign)?;
    let pivots = chol.l_dirty().diagonal();
    if pivots.min() <= SINGULAR_PIVOT_RATIO * pivots.max() {
        return Err(EstimatorError::SingularDesign);
    }
    let beta = chol.solve(&zty);
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(EstimatorError::SingularDesign);
    }
    Ok(Array1::from_iter(beta.iter().copied()))
}
