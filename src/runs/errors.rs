//! Errors for run records, comparisons, summaries and scenarios.
use crate::pipeline::errors::PipelineError;

pub type RunResult<T> = Result<T, RunError>;

#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// No record with this id in the registry.
    UnknownRun { id: String },

    /// Two runs share no DMU with an efficiency in both.
    NoCommonDmus { a: String, b: String },

    /// A run record could not be (de)serialized.
    Serialization { reason: String },

    /// A DMU lacks the measure the requirement amount is based on.
    MissingBaseMeasure { name: String, measure: String },

    /// The scenario DMU has no row in the rerun table.
    UnknownDmu { name: String },

    /// The rerun behind a scenario failed.
    Pipeline(PipelineError),
}

impl std::error::Error for RunError {}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::UnknownRun { id } => write!(f, "Unknown run '{id}'"),
            RunError::NoCommonDmus { a, b } => {
                write!(f, "Runs '{a}' and '{b}' have no DMUs in common")
            }
            RunError::Serialization { reason } => {
                write!(f, "Run record serialization failed: {reason}")
            }
            RunError::MissingBaseMeasure { name, measure } => {
                write!(f, "DMU '{name}' has no value for base measure '{measure}'")
            }
            RunError::UnknownDmu { name } => write!(f, "No DMU named '{name}' in the run"),
            RunError::Pipeline(e) => write!(f, "Scenario run failed: {e}"),
        }
    }
}

impl From<serde_json::Error> for RunError {
    fn from(err: serde_json::Error) -> Self {
        RunError::Serialization { reason: err.to_string() }
    }
}

impl From<PipelineError> for RunError {
    fn from(err: PipelineError) -> Self {
        RunError::Pipeline(err)
    }
}
