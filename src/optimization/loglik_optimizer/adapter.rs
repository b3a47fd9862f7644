//! Bridge from a [`LogLikelihood`] to argmin's `CostFunction`/`Gradient`.
//!
//! argmin minimizes, so the adapter exposes `c(θ) = −ℓ(θ)`. Analytic
//! gradients are negated; numeric ones are taken on the cost directly.
use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        finite_diff::fd_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};

#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }
}

impl<F: LogLikelihood> CostFunction for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value }.into());
        }
        Ok(-value)
    }
}

impl<F: LogLikelihood> Gradient for ArgMinAdapter<'_, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// `−∇ℓ(θ)` when the likelihood supplies a gradient, otherwise a
    /// finite-difference gradient of the cost (central first, forward on
    /// failure).
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                let cost = |t: &Theta| self.cost(t);
                Ok(fd_gradient(theta, &cost)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::OptResult;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Paraboloid;

    impl LogLikelihood for Paraboloid {
        type Data = f64;

        fn value(&self, theta: &Theta, center: &f64) -> OptResult<Cost> {
            Ok(-theta.mapv(|t| (t - center).powi(2)).sum())
        }

        fn check(&self, _theta: &Theta, _data: &f64) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Cost is the negated log-likelihood and the numeric gradient points
    // uphill in cost, i.e. away from the maximizer.
    //
    // Given
    // -----
    // - ℓ(θ) = −Σ(θ_i − 1)², evaluated at θ = (0, 2).
    //
    // Expect
    // ------
    // - c(θ) = 2, ∇c(θ) = 2(θ − 1) = (−2, 2).
    fn adapter_negates_value_and_differentiates_cost() {
        // Arrange
        let center = 1.0;
        let adapter = ArgMinAdapter::new(&Paraboloid, &center);
        let theta = array![0.0, 2.0];

        // Act
        let cost = adapter.cost(&theta).expect("finite cost");
        let grad = adapter.gradient(&theta).expect("finite gradient");

        // Assert
        assert_relative_eq!(cost, 2.0, epsilon = 1e-12);
        assert_relative_eq!(grad[0], -2.0, epsilon = 1e-5);
        assert_relative_eq!(grad[1], 2.0, epsilon = 1e-5);
    }
}
