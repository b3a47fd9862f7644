//! runs — what happens to a finished pipeline result.
//!
//! - [`registry`]: immutable run records, listing, lookup and comparison.
//! - [`summary`]: ranked requirement table priced on a cost base.
//! - [`scenario`]: what-if reruns for a single DMU.
pub mod errors;
pub mod registry;
pub mod scenario;
pub mod summary;

pub use self::errors::{RunError, RunResult};
pub use self::registry::{ComparisonRow, RunComparison, RunId, RunRecord, RunRegistry};
pub use self::scenario::{simulate, ScenarioOutcome};
pub use self::summary::{ranked_summary, RequirementBase, SummaryRow};
