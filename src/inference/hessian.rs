//! inference::hessian — classical standard errors from observed information.
//!
//! Purpose
//! -------
//! Turn a fitted likelihood into coefficient standard errors for the SFA fit
//! report. The observed information `J(θ̂)` is the finite-difference
//! Hessian of the **negative average** log-likelihood; variances are the
//! diagonal of its pseudoinverse divided by the sample size.
//!
//! Key behaviors
//! -------------
//! - [`calc_standard_errors`] differentiates a gradient map with
//!   `compute_hessian`, copies the result into `nalgebra` and solves via a
//!   symmetric eigendecomposition.
//! - Eigenvalues at or below [`EIGEN_EPS`] are dropped from the
//!   pseudoinverse. A parameter the data cannot identify therefore gets a
//!   standard error of zero in those directions rather than an infinity.
//!
//! Invariants & assumptions
//! ------------------------
//! - `grad_fn` is the gradient of `−ℓ(θ)/n`, so `J(θ̂)` is positive
//!   semi-definite at an interior maximum.
//! - No explicit inverse is ever formed.
//!
//! Testing notes
//! -------------
//! - Unit tests check the SEs of a diagonal quadratic against the closed
//!   form and that rank-deficient information does not blow up.
use crate::optimization::{
    errors::OptResult, loglik_optimizer::finite_diff::compute_hessian,
    numerical_stability::transformations::EIGEN_EPS,
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// Standard errors of `theta_hat` from the observed information.
///
/// Parameters
/// ----------
/// - `grad_fn`: gradient of the negative average log-likelihood.
/// - `theta_hat`: the maximizer.
/// - `n_obs`: number of observations behind the average.
///
/// Errors
/// ------
/// - Propagates `compute_hessian` failures (non-finite curvature).
pub fn calc_standard_errors<F: Fn(&Array1<f64>) -> Array1<f64>>(
    grad_fn: &F, theta_hat: &Array1<f64>, n_obs: usize,
) -> OptResult<Array1<f64>> {
    let obs_info = compute_hessian(grad_fn, theta_hat)?;
    let info = fill_dmatrix(&obs_info);
    let variances = pseudo_inverse_diagonal(info);
    let scale = n_obs.max(1) as f64;
    Ok(variances.mapv(|v| (v / scale).sqrt()))
}

fn fill_dmatrix(obs_info: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(obs_info.nrows(), obs_info.ncols(), |i, j| obs_info[[i, j]])
}

/// Diagonal of `J⁺ = Σ_k q_k q_kᵀ / λ_k` over eigenvalues above [`EIGEN_EPS`].
fn pseudo_inverse_diagonal(info: DMatrix<f64>) -> Array1<f64> {
    let n = info.nrows();
    let eigen = info.symmetric_eigen();
    let q = &eigen.eigenvectors;
    Array1::from_shape_fn(n, |i| {
        eigen
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(i, k)] / lambda)
            .sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // For −ℓ/n = ½(a θ0² + b θ1²) the information is diag(a, b), so
    // SE_i = √(1 / (n · J_ii)).
    //
    // Given
    // -----
    // - a = 4, b = 0.25, n = 100.
    //
    // Expect
    // ------
    // - SE = (0.05, 0.2).
    fn calc_standard_errors_matches_diagonal_quadratic() {
        // Arrange
        let grad_fn = |t: &Array1<f64>| array![4.0 * t[0], 0.25 * t[1]];
        let theta_hat = array![0.0, 0.0];

        // Act
        let se = calc_standard_errors(&grad_fn, &theta_hat, 100).expect("standard errors");

        // Assert
        assert_relative_eq!(se[0], 0.05, epsilon = 1e-6);
        assert_relative_eq!(se[1], 0.2, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // A flat direction must not produce infinite or NaN standard errors.
    fn calc_standard_errors_ignores_flat_direction() {
        let grad_fn = |t: &Array1<f64>| array![2.0 * t[0], 0.0];
        let theta_hat = array![1.0, 1.0];

        let se = calc_standard_errors(&grad_fn, &theta_hat, 10).expect("standard errors");

        assert!(se.iter().all(|v| v.is_finite()));
        assert_relative_eq!(se[1], 0.0, epsilon = 1e-12);
    }
}
