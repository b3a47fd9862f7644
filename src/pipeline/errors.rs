//! Errors for the pipeline layer: dataset validation, outlier detection,
//! requirement derivation and the two-pass orchestration around them.
//!
//! [`PipelineError`] is the error surfaced by [`run`](super::run); the
//! narrower [`OutlierError`] and [`RequirementError`] are returned by the
//! stand-alone detector and transform and convert into it with `From`.
use crate::frontier::errors::EstimatorError;

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type OutlierResult<T> = Result<T, OutlierError>;
pub type RequirementResult<T> = Result<T, RequirementError>;

/// Which estimation pass a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    First,
    Second,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::First => write!(f, "first pass"),
            Pass::Second => write!(f, "second pass"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutlierError {
    /// Too few finite scores to form quartiles.
    InsufficientData { found: usize, required: usize },

    /// Fence multiplier must be finite and non-negative.
    InvalidMultiplier { value: f64 },
}

impl std::error::Error for OutlierError {}

impl std::fmt::Display for OutlierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlierError::InsufficientData { found, required } => write!(
                f,
                "Outlier detection needs at least {required} finite scores, found {found}"
            ),
            OutlierError::InvalidMultiplier { value } => {
                write!(f, "Invalid IQR multiplier {value}: must be finite and non-negative")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequirementError {
    /// Truncation bounds must be finite with `0 ≤ min ≤ max`.
    InvalidBounds { min: f64, max: f64 },

    /// A fixed requirement for excluded DMUs must be finite.
    InvalidFallback { value: f64 },

    UnknownPolicy { name: String },
}

impl std::error::Error for RequirementError {}

impl std::fmt::Display for RequirementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementError::InvalidBounds { min, max } => write!(
                f,
                "Invalid truncation bounds [{min}, {max}]: need finite 0 <= min <= max"
            ),
            RequirementError::InvalidFallback { value } => {
                write!(f, "Invalid fixed requirement {value}: must be finite")
            }
            RequirementError::UnknownPolicy { name } => write!(
                f,
                "Unknown requirement policy '{name}': expected 'absolut' or 'percentilbaserat'"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    // ---- Dataset ----
    EmptyDataset,

    /// Two records share a DMU identifier.
    DuplicateDmu { dmu: String },

    /// No record with this display name.
    UnknownDmu { name: String },

    /// Requested measures that no record carries.
    MissingColumn { columns: Vec<String> },

    /// Input or output measure list is empty.
    NoMeasuresSelected { side: &'static str },

    // ---- Configuration ----
    InvalidConfig { reason: String },

    // ---- Stages ----
    /// Whole-pass estimator failure.
    Estimator { pass: Pass, source: EstimatorError },

    Outlier(OutlierError),

    Requirement(RequirementError),

    /// Every DMU was flagged in the first pass.
    EmptyRetainedSet,
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Estimator { source, .. } => Some(source),
            PipelineError::Outlier(e) => Some(e),
            PipelineError::Requirement(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::EmptyDataset => write!(f, "Dataset contains no DMUs"),
            PipelineError::DuplicateDmu { dmu } => write!(f, "Duplicate DMU identifier '{dmu}'"),
            PipelineError::UnknownDmu { name } => write!(f, "No DMU named '{name}'"),
            PipelineError::MissingColumn { columns } => {
                write!(f, "Missing measure column(s): {}", columns.join(", "))
            }
            PipelineError::NoMeasuresSelected { side } => {
                write!(f, "No {side} measures selected")
            }
            PipelineError::InvalidConfig { reason } => {
                write!(f, "Invalid pipeline configuration: {reason}")
            }
            PipelineError::Estimator { pass, source } => {
                write!(f, "Estimator failed in the {pass}: {source}")
            }
            PipelineError::Outlier(e) => write!(f, "{e}"),
            PipelineError::Requirement(e) => write!(f, "{e}"),
            PipelineError::EmptyRetainedSet => {
                write!(f, "Every DMU was flagged as an outlier; nothing left to re-estimate")
            }
        }
    }
}

impl From<OutlierError> for PipelineError {
    fn from(err: OutlierError) -> Self {
        PipelineError::Outlier(err)
    }
}

impl From<RequirementError> for PipelineError {
    fn from(err: RequirementError) -> Self {
        PipelineError::Requirement(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    // Purpose
    // -------
    // Missing columns are all named, and stage errors keep their source.
    fn display_and_source_chain() {
        let missing = PipelineError::MissingColumn { columns: vec!["CU".into(), "MW".into()] };
        let wrapped = PipelineError::Estimator {
            pass: Pass::Second,
            source: EstimatorError::InsufficientDmus { required: 4, found: 2 },
        };

        assert_eq!(missing.to_string(), "Missing measure column(s): CU, MW");
        assert!(wrapped.to_string().contains("second pass"));
        assert!(wrapped.source().is_some());
        assert!(PipelineError::EmptyDataset.source().is_none());
    }
}
