//! frontier::dea — input-oriented super-efficiency DEA.
//!
//! Purpose
//! -------
//! Score each DMU against a frontier built from every *other* scorable DMU
//! (leave-one-out envelopment LP). Leaving the evaluated unit out of its own
//! reference set lets efficient units score above 1, which is what the
//! upper outlier fence looks for.
//!
//! Key behaviors
//! -------------
//! - For DMU `i` solve
//!   `min θ  s.t.  Σ_{j≠i} λ_j y_jr ≥ y_ir,  Σ_{j≠i} λ_j x_jk ≤ θ x_ik,
//!   λ ≥ 0, θ ≥ 0` plus `Σ λ_j = 1` under variable returns to scale.
//! - The `n` programs are independent and run on the rayon pool over
//!   shared read-only matrices. Each task builds its own `good_lp` model
//!   and solves it with Clarabel.
//! - Infeasible programs (common under VRS for extreme units) and solver
//!   failures become `None` for that DMU only.
//! - With [`DeaOptions::timeout`] set, the deadline is checked before each
//!   program starts. Programs already running are not interrupted and
//!   finish; programs not yet started are skipped, and if any was skipped
//!   the pass fails with [`EstimatorError::Timeout`]. The pass can
//!   therefore overrun the deadline by up to one LP solve per worker.
//!
//! Invariants & assumptions
//! ------------------------
//! - Only scorable rows (finite, strictly positive measures) enter any
//!   reference set.
//! - Scores are radial input contractions: `θ < 1` is inefficient,
//!   `θ = 1` is on the frontier, `θ > 1` is super-efficient.
//!
//! Testing notes
//! -------------
//! - The three-DMU single input/output case has hand-computed scores.
//! - VRS infeasibility and timeout paths are exercised directly.
use crate::frontier::{
    errors::{EstimatorError, EstimatorResult},
    options::ReturnsToScale,
    validation::{check_shapes, require_population, scatter, scorable_rows, take_rows},
    Scores,
};
use good_lp::solvers::clarabel::clarabel;
use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable,
};
use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeaOptions {
    pub rts: ReturnsToScale,
    /// Deadline for *starting* programs, measured from the start of the
    /// pass. Running programs are never interrupted.
    pub timeout: Option<Duration>,
}

impl DeaOptions {
    pub fn new(rts: ReturnsToScale, timeout: Option<Duration>) -> EstimatorResult<Self> {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Err(EstimatorError::InvalidConfig {
                reason: "DEA timeout must be greater than zero".to_string(),
            });
        }
        Ok(Self { rts, timeout })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LpOutcome {
    Solved(f64),
    Failed,
    Skipped,
}

/// Super-efficiency score for every row; `None` for unscorable rows and
/// failed programs.
pub fn estimate(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, options: &DeaOptions,
) -> EstimatorResult<Scores> {
    check_shapes(inputs, outputs)?;
    let rows = scorable_rows(inputs, outputs);
    require_population(rows.len(), inputs.ncols() + outputs.ncols() + 1)?;

    let x = take_rows(inputs, &rows);
    let y = take_rows(outputs, &rows);
    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);
    info!(dmus = rows.len(), rts = ?options.rts, "solving DEA super-efficiency programs");

    let outcomes: Vec<LpOutcome> = (0..rows.len())
        .into_par_iter()
        .map(|k| {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return LpOutcome::Skipped;
            }
            match solve_super_efficiency(k, x.view(), y.view(), options.rts) {
                Ok(theta) if theta.is_finite() => LpOutcome::Solved(theta),
                Ok(theta) => {
                    debug!(row = rows[k], theta, "non-finite DEA score");
                    LpOutcome::Failed
                }
                Err(err) => {
                    debug!(row = rows[k], error = %err, "DEA program not solved");
                    LpOutcome::Failed
                }
            }
        })
        .collect();

    let completed = outcomes.iter().filter(|o| **o != LpOutcome::Skipped).count();
    if completed < outcomes.len() {
        let limit_ms = options.timeout.map_or(0, |t| t.as_millis());
        warn!(completed, total = outcomes.len(), limit_ms, "DEA pass exceeded its deadline");
        return Err(EstimatorError::Timeout { limit_ms, completed, total: outcomes.len() });
    }

    let values: Vec<Option<f64>> = outcomes
        .iter()
        .map(|o| match o {
            LpOutcome::Solved(theta) => Some(*theta),
            _ => None,
        })
        .collect();
    let failed = values.iter().filter(|v| v.is_none()).count();
    info!(failed, elapsed_ms = started.elapsed().as_millis(), "DEA pass finished");
    Ok(scatter(inputs.nrows(), &rows, &values))
}

/// Envelopment LP for row `k` against all other rows of `x`/`y`.
fn solve_super_efficiency(
    k: usize, x: ArrayView2<f64>, y: ArrayView2<f64>, rts: ReturnsToScale,
) -> Result<f64, ResolutionError> {
    let mut vars = variables!();
    let theta = vars.add(variable().min(0.0));
    let peers: Vec<(usize, Variable)> =
        (0..x.nrows()).filter(|&j| j != k).map(|j| (j, vars.add(variable().min(0.0)))).collect();

    let mut problem = vars.minimise(theta).using(clarabel);
    for r in 0..y.ncols() {
        let mut produced = Expression::from(0.0);
        for &(j, lambda) in &peers {
            produced += y[[j, r]] * lambda;
        }
        problem = problem.with(constraint!(produced >= y[[k, r]]));
    }
    for c in 0..x.ncols() {
        let mut consumed = Expression::from(0.0);
        for &(j, lambda) in &peers {
            consumed += x[[j, c]] * lambda;
        }
        problem = problem.with(constraint!(consumed <= x[[k, c]] * theta));
    }
    if rts == ReturnsToScale::Variable {
        let mut convexity = Expression::from(0.0);
        for &(_, lambda) in &peers {
            convexity += lambda;
        }
        problem = problem.with(constraint!(convexity == 1.0));
    }

    let solution = problem.solve()?;
    Ok(solution.value(theta))
}
