//! loglik_optimizer::types — numeric aliases and pre-wired L-BFGS solvers.
//!
//! Every likelihood in the crate works on `ndarray` vectors over `f64`. The
//! aliases below keep argmin's generic parameters out of the estimator code:
//! the SFA and StoNED modules only ever name [`Theta`], [`Grad`] and
//! [`Cost`].
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Unconstrained parameter vector, e.g. `(β, ln σ_u², ln σ_v²)` for SFA.
pub type Theta = Array1<f64>;

/// Gradient with the same length as [`Theta`].
pub type Grad = Array1<f64>;

/// Dense `k × k` second-derivative matrix.
pub type Hessian = Array2<f64>;

/// Scalar objective. Inside argmin this is the negated log-likelihood.
pub type Cost = f64;

/// Argmin function-evaluation counters, keyed by counter name.
pub type FnEvalMap = HashMap<String, u64>;

/// L-BFGS history size used when [`MLEOptions::lbfgs_mem`](super::MLEOptions) is unset.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
