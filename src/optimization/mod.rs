//! optimization — likelihood maximization and numerical helpers.
//!
//! Purpose
//! -------
//! Everything the parametric side of the crate needs to fit a model by
//! maximum likelihood: an argmin L-BFGS wrapper (`loglik_optimizer`),
//! guarded normal-distribution arithmetic (`numerical_stability`) and one
//! error surface (`errors::OptError`).
//!
//! Downstream usage
//! ----------------
//! - `frontier::sfa` maximizes the composed-error likelihood.
//! - `frontier::cnls::stoned` maximizes the quasi-likelihood over `λ`.
//! - `inference` reuses the finite-difference Hessian for standard errors.
//!
//! Conventions
//! -----------
//! - No I/O. Progress is reported through `tracing` at `debug` level, and
//!   argmin's own observer is available behind the `obs_slog` feature.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
