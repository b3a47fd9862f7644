//! frontier::sfa — parametric stochastic frontier.
//!
//! Purpose
//! -------
//! Fit one Cobb–Douglas frontier `ln y = β0 + Σ β_k ln x_k + v − s·u` over
//! the whole population and score each DMU by `exp(−E[u | ε])`.
//!
//! Key behaviors
//! -------------
//! - Orientation decides the response: the single output for production,
//!   total cost (sum of inputs) for cost frontiers.
//! - [`SfaBackend::Native`] maximizes the composed-error likelihood
//!   ([`loglik`]) with the crate's L-BFGS optimizer, starting from OLS
//!   coefficients and moment-based variance components.
//! - [`SfaBackend::External`] hands the logged data to an external program
//!   ([`external`]) and reads back per-DMU inefficiencies.
//! - [`fit`] returns the full [`SfaFit`] report (coefficients, standard
//!   errors, variance components, convergence) for the native backend.
//!
//! Invariants & assumptions
//! ------------------------
//! - Only scorable rows enter the fit; the others are `None`.
//! - Scores lie in `(0, 1]`.
//! - A non-converged optimizer is logged, not fatal: the best parameters
//!   found are still used. Optimizer *errors* fail the pass.
//!
//! Testing notes
//! -------------
//! - Native fits on deterministic pseudo-samples with a known frontier
//!   check coefficient recovery and the score range.
pub mod external;
pub mod loglik;

use crate::frontier::{
    decomposition::{conditional_mean, method_of_moments},
    errors::{EstimatorError, EstimatorResult},
    options::FrontierOrientation,
    validation::{check_shapes, require_population, scatter, scorable_rows, take_rows},
    Scores,
};
use crate::inference::calc_standard_errors;
use crate::optimization::loglik_optimizer::{
    finite_diff::fd_gradient, maximize, LogLikelihood, MLEOptions, Theta,
};
use crate::optimization::numerical_stability::half_normal_mean_factor;
use crate::utils::central_moments;
use argmin::core::Error;
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

pub use self::external::ExternalCommand;
use self::loglik::{ols, SfaData, SfaLogLik, SfaParams};

/// Distribution of the one-sided inefficiency term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InefficiencyDistribution {
    #[default]
    HalfNormal,
    TruncatedNormal,
}

impl FromStr for InefficiencyDistribution {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "halfnormal" | "hnormal" => Ok(InefficiencyDistribution::HalfNormal),
            "truncatednormal" | "truncnorm" | "tnormal" => {
                Ok(InefficiencyDistribution::TruncatedNormal)
            }
            _ => Err(EstimatorError::InvalidConfig {
                reason: format!("unknown inefficiency distribution '{s}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SfaBackend {
    #[default]
    Native,
    External(ExternalCommand),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SfaOptions {
    pub orientation: FrontierOrientation,
    pub distribution: InefficiencyDistribution,
    pub backend: SfaBackend,
    pub mle: MLEOptions,
}

impl SfaOptions {
    pub fn new(
        orientation: FrontierOrientation, distribution: InefficiencyDistribution,
        backend: SfaBackend, mle: MLEOptions,
    ) -> Self {
        Self { orientation, distribution, backend, mle }
    }
}

/// Native maximum-likelihood fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SfaFit {
    /// `(β0, β1, …, βk)` on the log scale.
    pub coefficients: Array1<f64>,
    /// Classical standard errors of the coefficients; `None` when the
    /// observed information could not be formed.
    pub std_errors: Option<Array1<f64>>,
    pub sigma_u: f64,
    pub sigma_v: f64,
    /// Pre-truncation mean; `None` for half-normal inefficiency.
    pub mu: Option<f64>,
    pub log_likelihood: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    /// `exp(−E[u | ε])` per input row.
    pub scores: Scores,
}

/// Scores for every row under either backend.
pub fn estimate(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, options: &SfaOptions,
) -> EstimatorResult<Scores> {
    match &options.backend {
        SfaBackend::Native => Ok(fit(inputs, outputs, options)?.scores),
        SfaBackend::External(command) => {
            let prepared = prepare(inputs, outputs, options.orientation)?;
            let u = external::fit_inefficiency(command, &prepared.ln_y, &prepared.ln_x)?;
            let values: Vec<Option<f64>> = u.iter().map(|u| u.map(|u| (-u).exp())).collect();
            Ok(scatter(inputs.nrows(), &prepared.rows, &values))
        }
    }
}

/// Native maximum-likelihood fit with a full report.
///
/// # Errors
/// - Shape, population and orientation errors as for [`estimate`].
/// - [`EstimatorError::InvalidConfig`] for an external backend.
/// - [`EstimatorError::SingularDesign`] if OLS initialization fails.
/// - [`EstimatorError::Optimization`] if the likelihood cannot be maximized.
pub fn fit(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, options: &SfaOptions,
) -> EstimatorResult<SfaFit> {
    if options.backend != SfaBackend::Native {
        return Err(EstimatorError::InvalidConfig {
            reason: "a full SFA fit report requires the native backend".to_string(),
        });
    }
    let prepared = prepare(inputs, outputs, options.orientation)?;
    let truncated = options.distribution == InefficiencyDistribution::TruncatedNormal;
    let data = SfaData::new(prepared.ln_y, &prepared.ln_x, options.orientation.sign(), truncated);

    let theta0 = initial_theta(&data, options.orientation)?;
    info!(dmus = data.y.len(), distribution = ?options.distribution, "fitting stochastic frontier");
    let outcome = maximize(&SfaLogLik, theta0, &data, &options.mle)?;
    if !outcome.converged {
        warn!(status = %outcome.status, "SFA optimizer did not report convergence");
    }

    let params = SfaParams::from_theta(&outcome.theta_hat, &data);
    let values: Vec<Option<f64>> = data
        .residuals(&params.beta)
        .iter()
        .map(|&eps| {
            let u = conditional_mean(eps, params.sigma_u, params.sigma_v, params.mu, data.sign);
            let score = (-u).exp();
            score.is_finite().then_some(score)
        })
        .collect();

    let std_errors = coefficient_std_errors(&outcome.theta_hat, &data);
    Ok(SfaFit {
        coefficients: params.beta,
        std_errors,
        sigma_u: params.sigma_u,
        sigma_v: params.sigma_v,
        mu: truncated.then_some(params.mu),
        log_likelihood: outcome.value,
        converged: outcome.converged,
        status: outcome.status,
        iterations: outcome.iterations,
        scores: scatter(inputs.nrows(), &prepared.rows, &values),
    })
}

struct Prepared {
    rows: Vec<usize>,
    ln_y: Array1<f64>,
    ln_x: Array2<f64>,
}

fn prepare(
    inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, orientation: FrontierOrientation,
) -> EstimatorResult<Prepared> {
    check_shapes(inputs, outputs)?;
    let rows = scorable_rows(inputs, outputs);
    require_population(rows.len(), inputs.ncols() + outputs.ncols() + 1)?;
    let x = take_rows(inputs, &rows);
    let y = take_rows(outputs, &rows);
    let (response, regressors) = orientation.response_and_regressors(x.view(), y.view())?;
    Ok(Prepared { rows, ln_y: response.mapv(f64::ln), ln_x: regressors.mapv(f64::ln) })
}

/// OLS coefficients with the intercept shifted by `s·E[u]`, plus
/// moment-based log-variances floored at a tenth of the residual spread.
fn initial_theta(data: &SfaData, orientation: FrontierOrientation) -> EstimatorResult<Theta> {
    let mut beta = ols(data)?;
    let residuals = data.residuals(&beta).to_vec();
    let vc = method_of_moments(&residuals, orientation)?;
    let spread = central_moments(&residuals).map_or(1.0, |(m2, _)| m2.sqrt());
    let floor = (0.1 * spread).max(1e-4);
    let sigma_u = vc.sigma_u.max(floor);
    let sigma_v = vc.sigma_v.max(floor);
    beta[0] += data.sign * sigma_u * half_normal_mean_factor();

    let mut theta: Vec<f64> = beta.to_vec();
    theta.push((sigma_u * sigma_u).ln());
    theta.push((sigma_v * sigma_v).ln());
    if data.truncated {
        theta.push(0.0);
    }
    Ok(Theta::from(theta))
}

/// Standard errors of the frontier coefficients from the observed
/// information of the average log-likelihood.
fn coefficient_std_errors(theta_hat: &Theta, data: &SfaData) -> Option<Array1<f64>> {
    let n = data.y.len();
    let neg_avg = |t: &Theta| -> Result<f64, Error> {
        Ok(-SfaLogLik.value(t, data)? / n as f64)
    };
    let grad_fn = |t: &Theta| {
        fd_gradient(t, &neg_avg).unwrap_or_else(|_| Array1::from_elem(t.len(), f64::NAN))
    };
    match calc_standard_errors(&grad_fn, theta_hat, n) {
        Ok(se) => Some(se.slice(s![..data.n_coefficients()]).to_owned()),
        Err(err) => {
            warn!(error = %err, "SFA standard errors unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::{LineSearcher, Tolerances};
    use approx::assert_relative_eq;

    /// Cost data on a known frontier `ln C = 0.5 + 0.8 ln q` with
    /// deterministic noise and one-sided inefficiency.
    fn cost_sample(n: usize) -> (Array2<f64>, Array2<f64>) {
        let mut inputs = Array2::<f64>::zeros((n, 1));
        let mut outputs = Array2::<f64>::zeros((n, 1));
        for i in 0..n {
            let q = 1.0 + i as f64 * 0.25;
            let v = 0.03 * ((i * 7 % 11) as f64 - 5.0) / 5.0;
            let u = 0.25 * ((i * 5 % 13) as f64 / 12.0).powi(2);
            outputs[[i, 0]] = q;
            inputs[[i, 0]] = (0.5 + 0.8 * q.ln() + v + u).exp();
        }
        (inputs, outputs)
    }

    fn opts() -> SfaOptions {
        let tols = Tolerances::new(Some(1e-7), None, Some(1000)).expect("tolerances");
        let mle = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).expect("mle");
        SfaOptions::new(
            FrontierOrientation::Cost,
            InefficiencyDistribution::HalfNormal,
            SfaBackend::Native,
            mle,
        )
    }

    #[test]
    // Purpose
    // -------
    // The native fit recovers the slope of a known cost frontier and
    // produces scores in (0, 1].
    //
    // Given
    // -----
    // - 40 DMUs on ln C = 0.5 + 0.8 ln q with small noise and inefficiency.
    //
    // Expect
    // ------
    // - The maximized log-likelihood is strictly above its value at the
    //   OLS/moment start, and the variance parameters moved.
    // - β1 within 0.1 of 0.8; every score in (0, 1]; a report with
    //   coefficient standard errors.
    fn native_fit_recovers_cost_frontier_slope() {
        // Arrange
        let (inputs, outputs) = cost_sample(40);
        let prepared = prepare(inputs.view(), outputs.view(), FrontierOrientation::Cost)
            .expect("prepared data");
        let data =
            SfaData::new(prepared.ln_y, &prepared.ln_x, FrontierOrientation::Cost.sign(), false);
        let theta0 = initial_theta(&data, FrontierOrientation::Cost).expect("start");
        let start = SfaParams::from_theta(&theta0, &data);
        let ll_start = SfaLogLik.value(&theta0, &data).expect("start log-likelihood");

        // Act
        let fit = fit(inputs.view(), outputs.view(), &opts()).expect("SFA fit");

        // Assert
        assert!(
            fit.log_likelihood > ll_start + 1e-6,
            "ℓ(θ̂) = {} vs ℓ(θ₀) = {ll_start}; status {}",
            fit.log_likelihood,
            fit.status
        );
        assert!(
            (fit.sigma_u - start.sigma_u).abs() > 1e-6 || (fit.sigma_v - start.sigma_v).abs() > 1e-6
        );
        assert_relative_eq!(fit.coefficients[1], 0.8, epsilon = 0.1);
        assert!(fit.scores.iter().all(|s| s.is_some_and(|v| v > 0.0 && v <= 1.0)));
        assert_eq!(fit.std_errors.as_ref().map(|se| se.len()), Some(2));
        assert!(fit.mu.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Fitting the same data twice gives identical scores and parameters.
    fn repeated_fit_is_identical() {
        let (inputs, outputs) = cost_sample(30);

        let first = fit(inputs.view(), outputs.view(), &opts()).expect("first fit");
        let second = fit(inputs.view(), outputs.view(), &opts()).expect("second fit");

        assert_eq!(first.scores, second.scores);
        assert_eq!(first.coefficients, second.coefficients);
        assert_eq!(first.log_likelihood, second.log_likelihood);
    }

    #[test]
    // Purpose
    // -------
    // Production orientation with several outputs is a configuration error.
    fn production_with_two_outputs_is_rejected() {
        let inputs = Array2::<f64>::ones((6, 1));
        let outputs = Array2::<f64>::ones((6, 2));
        let options = SfaOptions { orientation: FrontierOrientation::Production, ..opts() };

        let err = estimate(inputs.view(), outputs.view(), &options).expect_err("two outputs");

        assert!(matches!(err, EstimatorError::InvalidConfig { .. }));
    }

    #[test]
    // Purpose
    // -------
    // Unscorable rows stay `None` and the rest are still fitted.
    fn unscorable_rows_are_left_unscored() {
        let (mut inputs, outputs) = cost_sample(30);
        inputs[[4, 0]] = 0.0;

        let scores = estimate(inputs.view(), outputs.view(), &opts()).expect("SFA pass");

        assert_eq!(scores[4], None);
        assert_eq!(scores.iter().filter(|s| s.is_some()).count(), 29);
    }

    #[test]
    // Purpose
    // -------
    // Distribution names parse from the forms used in configuration files.
    fn distribution_parses_aliases() {
        assert_eq!(
            "truncNorm".parse::<InefficiencyDistribution>(),
            Ok(InefficiencyDistribution::TruncatedNormal)
        );
        assert_eq!(
            "half-normal".parse::<InefficiencyDistribution>(),
            Ok(InefficiencyDistribution::HalfNormal)
        );
    }
}
