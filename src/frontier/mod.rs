//! frontier — interchangeable efficiency estimators behind one contract.
//!
//! Purpose
//! -------
//! Score a population of DMUs against a best-practice frontier inferred from
//! the population itself. Three estimators share one calling convention:
//!
//! - [`dea`]: leave-one-out super-efficiency DEA (one LP per DMU).
//! - [`sfa`]: parametric stochastic frontier (one likelihood fit).
//! - [`cnls`]: convex nonparametric least squares with StoNED scoring (one
//!   quadratic program plus a variance decomposition).
//!
//! Key behaviors
//! -------------
//! - [`FrontierEstimator::estimate`] takes read-only `n × p` inputs and
//!   `n × q` outputs and returns [`Scores`] of length `n`.
//! - Per-DMU problems yield `None`; whole-pass problems yield
//!   [`EstimatorError`].
//! - [`Estimator`] is the serializable sum type the pipeline dispatches on.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least `p + q + 1` scorable DMUs ([`FrontierEstimator::min_dmus`]).
//! - Only DEA may report scores above 1.
//!
//! Conventions
//! -----------
//! - DEA outliers sit above the upper fence (super-efficient units); SFA
//!   and CNLS outliers sit below the lower fence.
pub mod cnls;
pub mod dea;
pub mod decomposition;
pub mod errors;
pub mod options;
pub mod sfa;
pub mod validation;

use crate::pipeline::outliers::OutlierDirection;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

pub use self::cnls::{CnlsOptions, Disturbance};
pub use self::cnls::stoned::VarianceEstimator;
pub use self::dea::DeaOptions;
pub use self::errors::{EstimatorError, EstimatorResult};
pub use self::options::{FrontierOrientation, ReturnsToScale};
pub use self::sfa::{ExternalCommand, InefficiencyDistribution, SfaBackend, SfaOptions};

/// One entry per DMU row; `None` when the DMU could not be scored.
pub type Scores = Vec<Option<f64>>;

/// Uniform estimator contract.
pub trait FrontierEstimator {
    /// Short model label used in run ids and tables.
    fn name(&self) -> &'static str;

    fn estimate(
        &self, inputs: ArrayView2<f64>, outputs: ArrayView2<f64>,
    ) -> EstimatorResult<Scores>;

    /// Tail of the score distribution where outliers sit.
    fn outlier_direction(&self) -> OutlierDirection;

    /// Whether scores above 1 are meaningful.
    fn reports_super_efficiency(&self) -> bool;

    fn min_dmus(&self, n_inputs: usize, n_outputs: usize) -> usize {
        n_inputs + n_outputs + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Estimator {
    Dea(DeaOptions),
    Sfa(SfaOptions),
    Cnls(CnlsOptions),
}

impl Default for Estimator {
    fn default() -> Self {
        Estimator::Dea(DeaOptions::default())
    }
}

impl FrontierEstimator for Estimator {
    fn name(&self) -> &'static str {
        match self {
            Estimator::Dea(_) => "DEA",
            Estimator::Sfa(_) => "SFA",
            Estimator::Cnls(_) => "CNLS",
        }
    }

    fn estimate(
        &self, inputs: ArrayView2<f64>, outputs: ArrayView2<f64>,
    ) -> EstimatorResult<Scores> {
        match self {
            Estimator::Dea(opts) => dea::estimate(inputs, outputs, opts),
            Estimator::Sfa(opts) => sfa::estimate(inputs, outputs, opts),
            Estimator::Cnls(opts) => cnls::estimate(inputs, outputs, opts),
        }
    }

    fn outlier_direction(&self) -> OutlierDirection {
        match self {
            Estimator::Dea(_) => OutlierDirection::Upper,
            Estimator::Sfa(_) | Estimator::Cnls(_) => OutlierDirection::Lower,
        }
    }

    fn reports_super_efficiency(&self) -> bool {
        matches!(self, Estimator::Dea(_))
    }
}

pub mod prelude {
    pub use super::errors::{EstimatorError, EstimatorResult};
    pub use super::{
        CnlsOptions, DeaOptions, Estimator, FrontierEstimator, FrontierOrientation,
        ReturnsToScale, Scores, SfaOptions,
    };
}
