//! loglik_optimizer::finite_diff — numeric gradients and Hessians.
//!
//! Purpose
//! -------
//! Wrap the `finitediff` crate for the two places the crate needs numeric
//! derivatives: the optimizer gradient when a likelihood has no analytic
//! one, and the observed-information Hessian used for SFA standard errors.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`] tries central differences, retrying with forward
//!   differences when an evaluation fails or the result is non-finite.
//!   `finitediff` closures must return `f64`, so the first evaluation
//!   error is parked in a `RefCell` and re-raised after differencing.
//! - [`compute_hessian`] differentiates a gradient map, preferring the
//!   central scheme, and symmetrizes the result.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned gradients and Hessians always pass [`validate_grad`] /
//!   [`validate_hessian`].
//! - Derivatives are taken in the unconstrained `θ` space.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        types::{Grad, Hessian, Theta},
        validation::{validate_grad, validate_hessian},
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Finite-difference gradient of a fallible scalar function.
///
/// # Errors
/// The first error raised by `func` on the forward-difference retry, or a
/// validation error if the forward gradient is still non-finite.
pub fn fd_gradient<G>(theta: &Theta, func: &G) -> Result<Grad, Error>
where
    G: Fn(&Theta) -> Result<f64, Error>,
{
    let closure_err: RefCell<Option<Error>> = RefCell::new(None);
    let capturing = |t: &Theta| -> f64 {
        match func(t) {
            Ok(v) => v,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };

    let central = theta.central_diff(&capturing);
    if closure_err.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
        return Ok(central);
    }
    run_fd_diff(theta, &capturing, &closure_err)
}

/// Forward-difference retry with error capture.
fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> Result<Grad, Error> {
    closure_err.replace(None);
    let forward = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&forward, theta.len())?;
    Ok(forward)
}

/// Hessian of the scalar whose gradient map is `grad_fn`, evaluated at `theta`.
///
/// # Errors
/// [`OptError::InvalidHessian`](crate::optimization::errors::OptError::InvalidHessian)
/// or `HessianDimMismatch` if neither scheme yields a finite square matrix.
pub fn compute_hessian<F: Fn(&Theta) -> Grad>(grad_fn: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut hess = theta.central_hessian(grad_fn);
    if validate_hessian(&hess, dim).is_err() {
        hess = theta.forward_hessian(grad_fn);
        validate_hessian(&hess, dim)?;
    }
    symmetrize_hess(&mut hess);
    Ok(hess)
}

fn symmetrize_hess(hess: &mut Hessian) {
    let n = hess.nrows();
    for i in 0..n {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptError;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Central differences recover the gradient of a smooth quadratic.
    fn fd_gradient_matches_analytic_quadratic() {
        let theta = array![1.0, -2.0];
        let f = |t: &Theta| -> Result<f64, Error> { Ok(t[0] * t[0] + 3.0 * t[1]) };

        let g = fd_gradient(&theta, &f).expect("gradient");

        assert_relative_eq!(g[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A failing evaluation is surfaced as the original error rather than a
    // NaN gradient.
    fn fd_gradient_surfaces_closure_error() {
        let theta = array![0.5];
        let f = |_: &Theta| -> Result<f64, Error> {
            Err(OptError::InvalidData { reason: "boom".to_string() }.into())
        };

        let err: OptError = fd_gradient(&theta, &f).expect_err("must fail").into();

        assert_eq!(err, OptError::InvalidData { reason: "boom".to_string() });
    }

    #[test]
    // Purpose
    // -------
    // Hessian of f(θ) = θ0² + θ0·θ1 is [[2, 1], [1, 0]] and symmetric.
    fn compute_hessian_recovers_cross_term() {
        let theta = array![0.3, 0.7];
        let grad_fn = |t: &Theta| array![2.0 * t[0] + t[1], t[0]];

        let h = compute_hessian(&grad_fn, &theta).expect("hessian");

        assert_relative_eq!(h[[0, 0]], 2.0, epsilon = 1e-6);
        assert_relative_eq!(h[[0, 1]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(h[[1, 0]], h[[0, 1]], epsilon = 1e-15);
        assert_relative_eq!(h[[1, 1]], 0.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A gradient map producing NaN cannot be turned into a Hessian.
    fn compute_hessian_rejects_non_finite_gradient() {
        let theta = array![1.0];
        let grad_fn = |_: &Theta| array![f64::NAN];

        assert!(matches!(
            compute_hessian(&grad_fn, &theta),
            Err(OptError::InvalidHessian { .. })
        ));
    }
}
