//! Numerically stable scalar transforms for frontier likelihoods.
//!
//! The composed-error likelihoods evaluate `ln Φ(z)` and the inverse Mills
//! ratio `φ(z)/Φ(z)` far into the left tail, where the naïve forms
//! underflow to `ln 0` and `0/0`. The helpers here switch to asymptotic
//! expansions past [`LEFT_TAIL_CUTOFF`], so callers can feed raw
//! standardized residuals without clamping.
//!
//! # Provided items
//! - [`safe_softplus`] / [`safe_softplus_inv`]: map ℝ ↔ (0, ∞) without
//!   overflow. Used for the signal-to-noise ratio `λ` in the StoNED
//!   quasi-likelihood.
//! - [`std_normal_pdf`], [`std_normal_cdf`], [`std_normal_ln_cdf`].
//! - [`inverse_mills`]: `φ(z)/Φ(z)`, the core of the JLMS conditional mean.
//! - [`EIGEN_EPS`], [`VARIANCE_FLOOR`]: shared tolerances.
use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Eigenvalues of an information matrix at or below this are treated as zero.
pub const EIGEN_EPS: f64 = 1e-10;

/// Smallest variance component accepted before a decomposition is treated
/// as degenerate (all noise or all inefficiency).
pub const VARIANCE_FLOOR: f64 = 1e-12;

/// Below this `z`, `ln Φ(z)` switches to its asymptotic series.
pub const LEFT_TAIL_CUTOFF: f64 = -30.0;

/// `ln(√(2π))`
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// For `x > 20` the correction term `ln1p(exp(-x))` is below `f64`
/// resolution, so `x` is returned directly.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Inverse of [`safe_softplus`] on `(0, ∞)`: `ln(exp(x) - 1)`.
///
/// `x` must be finite and strictly positive.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Standard normal density `φ(z)`.
pub fn std_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z - LN_SQRT_2PI).exp()
}

/// Standard normal distribution function `Φ(z)` via `erfc`.
///
/// `erfc` keeps full relative precision in the left tail, unlike
/// `0.5 * (1 + erf(z/√2))`.
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * FRAC_1_SQRT_2)
}

/// `ln Φ(z)`, finite for every finite `z`.
///
/// Past [`LEFT_TAIL_CUTOFF`] uses
/// `ln Φ(z) ≈ ln φ(z) − ln(−z) + ln(1 − 1/z² + 3/z⁴)`.
pub fn std_normal_ln_cdf(z: f64) -> f64 {
    if z < LEFT_TAIL_CUTOFF {
        let z2 = z * z;
        -0.5 * z2 - LN_SQRT_2PI - (-z).ln() + (1.0 - 1.0 / z2 + 3.0 / (z2 * z2)).ln()
    } else {
        std_normal_cdf(z).ln()
    }
}

/// Inverse Mills ratio `φ(z)/Φ(z)`.
///
/// Tends to `−z` as `z → −∞` and to `0` as `z → ∞`.
pub fn inverse_mills(z: f64) -> f64 {
    if z < LEFT_TAIL_CUTOFF {
        let z2 = z * z;
        -z / (1.0 - 1.0 / z2 + 3.0 / (z2 * z2))
    } else {
        (-0.5 * z * z - LN_SQRT_2PI - std_normal_ln_cdf(z)).exp()
    }
}

/// `√(2/π)`, the mean of a unit half-normal.
pub fn half_normal_mean_factor() -> f64 {
    (2.0 / PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Softplus and its inverse must round-trip on moderate positive values,
    // including the branch switch at 20.
    fn softplus_inverse_recovers_input() {
        for &x in &[0.05_f64, 0.7, 3.0, 19.5, 25.0] {
            let t = safe_softplus_inv(x);
            assert_relative_eq!(safe_softplus(t), x, max_relative = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the normal helpers against textbook values.
    //
    // Given
    // -----
    // - Φ(0) = 0.5, Φ(1.959963985) = 0.975, φ(0) = 1/√(2π).
    fn normal_helpers_match_reference_values() {
        assert_relative_eq!(std_normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(std_normal_cdf(1.959_963_985), 0.975, epsilon = 1e-9);
        assert_relative_eq!(std_normal_pdf(0.0), 1.0 / (2.0 * PI).sqrt(), epsilon = 1e-15);
        assert_relative_eq!(std_normal_ln_cdf(0.0), 0.5_f64.ln(), epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // The asymptotic branch of `ln Φ` must join the direct branch smoothly.
    //
    // Expect
    // ------
    // - Values just either side of the cutoff agree to ~1e-6 relative.
    // - Deep left tail stays finite.
    fn ln_cdf_is_continuous_across_tail_cutoff() {
        let left = std_normal_ln_cdf(LEFT_TAIL_CUTOFF - 1e-9);
        let right = std_normal_ln_cdf(LEFT_TAIL_CUTOFF + 1e-9);

        assert_relative_eq!(left, right, max_relative = 1e-6);
        assert!(std_normal_ln_cdf(-200.0).is_finite());
    }

    #[test]
    // Purpose
    // -------
    // Inverse Mills ratio: φ(0)/Φ(0) = 2φ(0), approaches −z in the left tail,
    // and vanishes in the right tail.
    fn inverse_mills_limits() {
        assert_relative_eq!(inverse_mills(0.0), 2.0 * std_normal_pdf(0.0), epsilon = 1e-14);
        assert_relative_eq!(inverse_mills(-60.0), 60.0, max_relative = 1e-3);
        assert!(inverse_mills(40.0) < 1e-300);
        assert_relative_eq!(
            inverse_mills(LEFT_TAIL_CUTOFF - 1e-9),
            inverse_mills(LEFT_TAIL_CUTOFF + 1e-9),
            max_relative = 1e-6
        );
    }
}
