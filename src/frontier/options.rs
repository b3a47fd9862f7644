//! frontier::options — knobs shared by more than one estimator.
//!
//! [`ReturnsToScale`] applies to DEA and CNLS; [`FrontierOrientation`]
//! applies to SFA and CNLS and decides which measure is the response. Both
//! parse from the short names used in the regulator's dashboard (`"crs"`,
//! `"vrs"`, `"prod"`, `"cost"`).
use crate::frontier::errors::{EstimatorError, EstimatorResult};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnsToScale {
    #[default]
    Constant,
    Variable,
}

impl FromStr for ReturnsToScale {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crs" | "constant" => Ok(ReturnsToScale::Constant),
            "vrs" | "variable" => Ok(ReturnsToScale::Variable),
            _ => Err(EstimatorError::InvalidConfig {
                reason: format!("unknown returns to scale '{s}', expected 'crs' or 'vrs'"),
            }),
        }
    }
}

/// Which side of the data the frontier bounds.
///
/// - `Production`: the single output is the response, inputs are
///   regressors, inefficiency lowers the response.
/// - `Cost`: total cost (sum of inputs) is the response, outputs are
///   regressors, inefficiency raises the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierOrientation {
    Production,
    #[default]
    Cost,
}

impl FrontierOrientation {
    /// `s` in `ε = v − s·u`: `+1` for production, `−1` for cost.
    pub fn sign(self) -> f64 {
        match self {
            FrontierOrientation::Production => 1.0,
            FrontierOrientation::Cost => -1.0,
        }
    }

    /// Split the measures into a response vector and regressor matrix.
    ///
    /// # Errors
    /// [`EstimatorError::InvalidConfig`] for production orientation with
    /// more than one output.
    pub fn response_and_regressors(
        self, inputs: ArrayView2<f64>, outputs: ArrayView2<f64>,
    ) -> EstimatorResult<(Array1<f64>, Array2<f64>)> {
        match self {
            FrontierOrientation::Production => {
                if outputs.ncols() != 1 {
                    return Err(EstimatorError::InvalidConfig {
                        reason: format!(
                            "production orientation needs exactly one output, got {}",
                            outputs.ncols()
                        ),
                    });
                }
                Ok((outputs.column(0).to_owned(), inputs.to_owned()))
            }
            FrontierOrientation::Cost => Ok((inputs.sum_axis(Axis(1)), outputs.to_owned())),
        }
    }
}

impl FromStr for FrontierOrientation {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Ok(FrontierOrientation::Production),
            "cost" => Ok(FrontierOrientation::Cost),
            _ => Err(EstimatorError::InvalidConfig {
                reason: format!("unknown orientation '{s}', expected 'prod' or 'cost'"),
            }),
        }
    }
}
