//! frontier::errors — whole-pass failures of a frontier estimator.
//!
//! Per-DMU problems (an infeasible LP, a row with a zero measure) are not
//! errors; they show up as `None` scores. [`EstimatorError`] is reserved for
//! failures that invalidate the entire pass.
use crate::optimization::errors::OptError;

pub type EstimatorResult<T> = Result<T, EstimatorError>;

#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    // ---- Input shape ----
    /// Fewer scorable DMUs than the estimator needs.
    InsufficientDmus { required: usize, found: usize },

    /// Inputs and outputs disagree on the number of rows.
    ShapeMismatch { input_rows: usize, output_rows: usize },

    /// Inputs or outputs have zero columns.
    NoMeasures { side: &'static str },

    // ---- Configuration ----
    /// Option combination the estimator cannot honor.
    InvalidConfig { reason: String },

    /// Disturbance structure with no configured solver.
    UnsupportedDisturbance { disturbance: String },

    // ---- Numerical ----
    /// OLS normal equations could not be solved.
    SingularDesign,

    /// Batch solver did not reach an optimal solution.
    SolverFailed { status: String },

    /// Likelihood maximization failed.
    Optimization(OptError),

    /// The pass deadline passed before every LP was started.
    Timeout { limit_ms: u128, completed: usize, total: usize },

    // ---- External process ----
    /// Process could not be started or exited unsuccessfully.
    ExternalProcess { program: String, code: Option<i32>, stderr: String },

    /// Process exited cleanly but its output could not be used.
    MalformedOutput { reason: String },

    /// Handoff file could not be written or read.
    Io { reason: String },
}

impl std::error::Error for EstimatorError {}

impl std::fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorError::InsufficientDmus { required, found } => {
                write!(f, "Insufficient DMUs: need at least {required}, found {found}")
            }
            EstimatorError::ShapeMismatch { input_rows, output_rows } => write!(
                f,
                "Shape mismatch: inputs have {input_rows} rows, outputs have {output_rows}"
            ),
            EstimatorError::NoMeasures { side } => write!(f, "No {side} measures supplied"),
            EstimatorError::InvalidConfig { reason } => {
                write!(f, "Invalid estimator configuration: {reason}")
            }
            EstimatorError::UnsupportedDisturbance { disturbance } => write!(
                f,
                "Unsupported disturbance '{disturbance}': no constrained nonlinear solver is configured"
            ),
            EstimatorError::SingularDesign => {
                write!(f, "Design matrix is singular; regressors are collinear")
            }
            EstimatorError::SolverFailed { status } => write!(f, "Solver failed: {status}"),
            EstimatorError::Optimization(e) => write!(f, "Likelihood optimization failed: {e}"),
            EstimatorError::Timeout { limit_ms, completed, total } => write!(
                f,
                "Estimation timed out after {limit_ms} ms with {completed} of {total} DMUs solved"
            ),
            EstimatorError::ExternalProcess { program, code, stderr } => match code {
                Some(code) => write!(f, "External process '{program}' exited with {code}: {stderr}"),
                None => write!(f, "External process '{program}' failed: {stderr}"),
            },
            EstimatorError::MalformedOutput { reason } => {
                write!(f, "Malformed external output: {reason}")
            }
            EstimatorError::Io { reason } => write!(f, "Handoff I/O error: {reason}"),
        }
    }
}

impl From<OptError> for EstimatorError {
    fn from(err: OptError) -> Self {
        EstimatorError::Optimization(err)
    }
}

impl From<std::io::Error> for EstimatorError {
    fn from(err: std::io::Error) -> Self {
        EstimatorError::Io { reason: err.to_string() }
    }
}

impl From<csv::Error> for EstimatorError {
    fn from(err: csv::Error) -> Self {
        EstimatorError::MalformedOutput { reason: err.to_string() }
    }
}
