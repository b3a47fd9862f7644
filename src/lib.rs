//! frontier_efficiency — outlier-robust frontier efficiency for regulated
//! network operators.
//!
//! Purpose
//! -------
//! Estimate each operating unit's (DMU's) efficiency against a best-practice
//! frontier inferred from the population itself, and convert it into an
//! annualized revenue-reduction requirement.
//!
//! Key behaviors
//! -------------
//! - [`frontier`]: three interchangeable estimators behind one contract.
//!   Super-efficiency DEA (parallel LPs), stochastic frontier analysis
//!   (maximum likelihood or an external program) and CNLS with StoNED
//!   scoring (one quadratic program plus a variance decomposition).
//! - [`pipeline`]: measure selection, the two-pass outlier-robust
//!   orchestration and the requirement transform.
//! - [`runs`]: immutable run records, run comparison, ranked summaries and
//!   what-if scenarios.
//! - [`optimization`] and [`inference`]: the L-BFGS likelihood machinery and
//!   observed-information standard errors used by the parametric models.
//!
//! Invariants & assumptions
//! ------------------------
//! - Input data are never mutated; every stage produces new values.
//! - Per-DMU failures are `None` scores; whole-pass failures are errors.
//! - No I/O beyond the external SFA handoff directory. Persisting run
//!   records is left to the caller through their JSON form.
//!
//! Conventions
//! -----------
//! - Scores are radial: 1 is on the frontier, lower is less efficient, DEA
//!   super-efficiency may exceed 1.
//! - Logging goes through `tracing`; install a subscriber to see it.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to the code; `tests/` runs the whole pipeline
//!   on a small regulatory dataset.

pub mod frontier;
pub mod inference;
pub mod optimization;
pub mod pipeline;
pub mod runs;
pub mod utils;

pub mod prelude {
    pub use crate::frontier::prelude::*;
    pub use crate::pipeline::prelude::*;
    pub use crate::runs::{RequirementBase, RunId, RunRecord, RunRegistry};
}
