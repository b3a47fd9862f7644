//! inference — post-estimation uncertainty for likelihood-based frontiers.
//!
//! Only the stochastic frontier is fitted by maximum likelihood, so this
//! layer is small: [`hessian::calc_standard_errors`] turns the observed
//! information at the MLE into classical standard errors for the SFA fit
//! report.

pub mod hessian;

pub use self::hessian::calc_standard_errors;
