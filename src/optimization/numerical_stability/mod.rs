//! numerical_stability — guarded transforms shared by the frontier likelihoods.
//!
//! Purpose
//! -------
//! Keep the normal-distribution tail arithmetic used by the SFA likelihood,
//! the StoNED quasi-likelihood and the JLMS conditional mean in one place,
//! together with the small tolerances those routines share.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite `f64`; validation of data happens in the estimator
//!   layer.
//! - Every function is pure and allocation-free, so it is safe in tight
//!   per-observation loops.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] compare against reference values and
//!   check continuity where a helper switches to an asymptotic branch.

pub mod transformations;

pub use self::transformations::{
    EIGEN_EPS, LEFT_TAIL_CUTOFF, VARIANCE_FLOOR, half_normal_mean_factor, inverse_mills,
    safe_softplus, safe_softplus_inv, std_normal_cdf, std_normal_ln_cdf, std_normal_pdf,
};

pub mod prelude {
    pub use super::transformations::{
        EIGEN_EPS, VARIANCE_FLOOR, inverse_mills, safe_softplus, safe_softplus_inv,
        std_normal_ln_cdf,
    };
}
