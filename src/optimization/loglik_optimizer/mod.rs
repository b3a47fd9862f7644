//! loglik_optimizer — argmin-backed maximization of frontier log-likelihoods.
//!
//! Purpose
//! -------
//! Give the estimators one call, [`maximize`], that fits any model
//! implementing [`LogLikelihood`] with L-BFGS. The SFA composed-error
//! likelihood and the StoNED quasi-likelihood over `λ = σ_u/σ_v` both go
//! through it.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `ℓ(θ)` into the cost `−ℓ(θ)`.
//! - [`solver`] builds L-BFGS with a More–Thuente or Hager–Zhang line
//!   search and runs it to an [`OptimOutcome`].
//! - [`finite_diff`] supplies numeric gradients and the Hessian used for
//!   observed-information standard errors.
//! - [`validation`] checks tolerances, parameter vectors and derivatives.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters live in unconstrained space. Models map to constrained
//!   quantities themselves (log-variances, softplus).
//! - Likelihood domain problems are `OptError` values, never panics.
//!
//! Conventions
//! -----------
//! - [`OptimOutcome::value`] is always the log-likelihood, not the cost.
//!
//! Testing notes
//! -------------
//! - `solver` tests fit a Gaussian with a known closed-form MLE under both
//!   line searches; the other submodules test their helpers directly.

pub mod adapter;
pub mod finite_diff;
pub mod solver;
pub mod traits;
pub mod types;
pub mod validation;

pub use self::solver::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

pub mod prelude {
    pub use super::solver::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
