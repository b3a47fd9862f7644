//! frontier::cnls — convex nonparametric least squares with StoNED scoring.
//!
//! Purpose
//! -------
//! Fit a piecewise-linear frontier that is only required to be monotone and
//! concave (production) or convex (cost), then split its residuals into
//! noise and inefficiency with the StoNED decomposition ([`stoned`]).
//!
//! Key behaviors
//! -------------
//! - Additive CNLS is the quadratic program
//!   `min Σ ε_i²  s.t.  y_i = α_i + β_i·x_i + ε_i`,
//!   `α_i + β_i·x_i ≤ α_h + β_h·x_i` for all `i ≠ h` (reversed for cost),
//!   `β_i ≥ 0`, solved directly with Clarabel. Constant returns to scale
//!   drops the intercepts `α`.
//! - Response and regressors are rescaled by their means before solving;
//!   the program is invariant to that scaling and Clarabel converges more
//!   reliably on unit-sized data.
//! - The multiplicative disturbance needs a constrained nonlinear solver
//!   and is refused with [`EstimatorError::UnsupportedDisturbance`].
//! - Efficiency is `1 / (1 + u_i / y_i)` where `u_i = E[u | ε_i]` and
//!   `y_i > 0` is the observed response (output for production, total
//!   input for cost). Every scorable DMU gets a score in `(0, 1]`
//!   regardless of its size.
//!
//! Invariants & assumptions
//! ------------------------
//! - One batch solve per pass. A solver status other than solved or
//!   almost solved fails the whole pass.
//! - The QP has `n(n − 1)` shape constraints; populations of a few hundred
//!   DMUs are the intended scale.
//!
//! Testing notes
//! -------------
//! - Data already on a concave frontier gives zero residuals and unit
//!   scores; noisy cost data checks score ranges and the decomposition.
pub mod stoned;

use crate::frontier::{
    decomposition::{conditional_mean, VarianceComponents},
    errors::{EstimatorError, EstimatorResult},
    options::{FrontierOrientation, ReturnsToScale},
    validation::{check_shapes, require_population, scatter, scorable_rows, take_rows},
    Scores,
};
use crate::optimization::loglik_optimizer::MLEOptions;
use crate::utils::mean;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use self::stoned::{decompose, VarianceEstimator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disturbance {
    #[default]
    Additive,
    Multiplicative,
}

impl FromStr for Disturbance {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "addi" | "additive" => Ok(Disturbance::Additive),
            "mult" | "multiplicative" => Ok(Disturbance::Multiplicative),
            _ => Err(EstimatorError::InvalidConfig {
                reason: format!("unknown disturbance '{s}', expected 'addi' or 'mult'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CnlsOptions {
    pub orientation: FrontierOrientation,
    pub rts: ReturnsToScale,
    pub disturbance: Disturbance,
    pub variance: VarianceEstimator,
    /// Optimizer settings for the quasi-likelihood variance step.
    pub mle: MLEOptions,
}

/// CNLS fit and StoNED decomposition over the scorable rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CnlsFit {
    /// Row indices (into the caller's matrices) that were fitted.
    pub rows: Vec<usize>,
    /// CNLS residuals `ε̂_i` in response units.
    pub residuals: Array1<f64>,
    /// CNLS fitted values `ŷ_i = y_i − ε̂_i`.
    pub fitted: Array1<f64>,
    pub components: VarianceComponents,
    /// `1 / (1 + u_i / y_i)` per input row.
    pub scores: Scores,
}

pub fn estimate(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, options: &CnlsOptions,
) -> EstimatorResult<Scores> {
    Ok(fit(inputs, outputs, options)?.scores)
}

/// Solve the CNLS program and score every row.
pub fn fit(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, options: &CnlsOptions,
) -> EstimatorResult<CnlsFit> {
    if options.disturbance == Disturbance::Multiplicative {
        return Err(EstimatorError::UnsupportedDisturbance {
            disturbance: "multiplicative".to_string(),
        });
    }
    check_shapes(inputs, outputs)?;
    let rows = scorable_rows(inputs, outputs);
    require_population(rows.len(), inputs.ncols() + outputs.ncols() + 1)?;
    let x_in = take_rows(inputs, &rows);
    let y_out = take_rows(outputs, &rows);
    let (y, x) = options.orientation.response_and_regressors(x_in.view(), y_out.view())?;

    info!(dmus = rows.len(), rts = ?options.rts, orientation = ?options.orientation, "solving CNLS program");
    let residuals = solve_additive(&y, &x, options.orientation, options.rts)?;
    let fitted = &y - &residuals;

    let components =
        decompose(&residuals.to_vec(), options.orientation, options.variance, &options.mle)?;
    debug!(sigma_u = components.sigma_u, sigma_v = components.sigma_v, "StoNED variance components");

    let sign = options.orientation.sign();
    let expected_u = components.mean_inefficiency();
    let values: Vec<Option<f64>> = residuals
        .iter()
        .zip(y.iter())
        .map(|(&eps, &observed)| {
            let u = conditional_mean(eps - sign * expected_u, components.sigma_u, components.sigma_v, 0.0, sign);
            let score = 1.0 / (1.0 + u / observed);
            score.is_finite().then_some(score)
        })
        .collect();

    Ok(CnlsFit {
        scores: scatter(inputs.nrows(), &rows, &values),
        rows,
        residuals,
        fitted,
        components,
    })
}

/// Residuals of the additive CNLS quadratic program.
fn solve_additive(
    y: &Array1<f64>, x: &Array2<f64>, orientation: FrontierOrientation, rts: ReturnsToScale,
) -> EstimatorResult<Array1<f64>> {
    let (n, d) = x.dim();
    let y_scale = mean(&y.to_vec()).filter(|m| *m > 0.0).unwrap_or(1.0);
    let x_scale: Vec<f64> =
        (0..d).map(|k| mean(&x.column(k).to_vec()).filter(|m| *m > 0.0).unwrap_or(1.0)).collect();
    let ys = y.mapv(|v| v / y_scale);
    let xs = Array2::from_shape_fn((n, d), |(i, k)| x[[i, k]] / x_scale[k]);

    let layout = QpLayout::new(n, d, rts);
    let shape_sign = orientation.sign();
    let mut a = Triplets::default();
    let mut b = Vec::new();

    // y_i = α_i + β_i·x_i + ε_i
    for i in 0..n {
        let row = b.len();
        if let Some(col) = layout.alpha(i) {
            a.push(row, col, 1.0);
        }
        for k in 0..d {
            a.push(row, layout.beta(i, k), xs[[i, k]]);
        }
        a.push(row, layout.eps(i), 1.0);
        b.push(ys[i]);
    }
    let n_eq = b.len();

    // s·(α_i + β_i·x_i − α_h − β_h·x_i) ≤ 0
    for i in 0..n {
        for h in (0..n).filter(|&h| h != i) {
            let row = b.len();
            if let (Some(ai), Some(ah)) = (layout.alpha(i), layout.alpha(h)) {
                a.push(row, ai, shape_sign);
                a.push(row, ah, -shape_sign);
            }
            for k in 0..d {
                a.push(row, layout.beta(i, k), shape_sign * xs[[i, k]]);
                a.push(row, layout.beta(h, k), -shape_sign * xs[[i, k]]);
            }
            b.push(0.0);
        }
    }

    // β ≥ 0
    for i in 0..n {
        for k in 0..d {
            let row = b.len();
            a.push(row, layout.beta(i, k), -1.0);
            b.push(0.0);
        }
    }
    let n_ineq = b.len() - n_eq;

    let nvar = layout.n_vars();
    let mut p = Triplets::default();
    for i in 0..n {
        p.push(layout.eps(i), layout.eps(i), 2.0);
    }
    let q = vec![0.0; nvar];
    let cones = [SupportedConeT::ZeroConeT(n_eq), SupportedConeT::NonnegativeConeT(n_ineq)];
    let settings = DefaultSettings { verbose: false, ..DefaultSettings::default() };

    let mut solver = DefaultSolver::new(
        &p.into_csc(nvar, nvar),
        &q,
        &a.into_csc(b.len(), nvar),
        &b,
        &cones,
        settings,
    );
    solver.solve();
    match solver.solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => {}
        status => return Err(EstimatorError::SolverFailed { status: format!("{status:?}") }),
    }
    let x_opt = &solver.solution.x;
    Ok(Array1::from_shape_fn(n, |i| x_opt[layout.eps(i)] * y_scale))
}

/// Column positions of `α`, `β` and `ε` in the QP variable vector.
struct QpLayout {
    n: usize,
    d: usize,
    alpha_len: usize,
}

impl QpLayout {
    fn new(n: usize, d: usize, rts: ReturnsToScale) -> Self {
        let alpha_len = match rts {
            ReturnsToScale::Variable => n,
            ReturnsToScale::Constant => 0,
        };
        Self { n, d, alpha_len }
    }

    fn alpha(&self, i: usize) -> Option<usize> {
        (self.alpha_len > 0).then_some(i)
    }

    fn beta(&self, i: usize, k: usize) -> usize {
        self.alpha_len + i * self.d + k
    }

    fn eps(&self, i: usize) -> usize {
        self.alpha_len + self.n * self.d + i
    }

    fn n_vars(&self) -> usize {
        self.alpha_len + self.n * self.d + self.n
    }
}

/// Coordinate-form sparse matrix accumulated row by row.
#[derive(Default)]
struct Triplets {
    entries: Vec<(usize, usize, f64)>,
}

impl Triplets {
    fn push(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    fn into_csc(mut self, m: usize, n: usize) -> CscMatrix<f64> {
        self.entries.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
        let mut colptr = vec![0usize; n + 1];
        let mut rowval = Vec::with_capacity(self.entries.len());
        let mut nzval = Vec::with_capacity(self.entries.len());
        for &(row, col, value) in &self.entries {
            colptr[col + 1] += 1;
            rowval.push(row);
            nzval.push(value);
        }
        for c in 0..n {
            colptr[c + 1] += colptr[c];
        }
        CscMatrix::new(m, n, colptr, rowval, nzval)
    }
}
