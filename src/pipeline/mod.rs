//! pipeline — from DMU records to a requirement table.
//!
//! Purpose
//! -------
//! Wrap a [`frontier`](crate::frontier) estimator in the regulator's
//! procedure: select measures, estimate, drop outliers, re-estimate, and
//! convert scores into annual requirements.
//!
//! Key behaviors
//! -------------
//! - [`dataset`]: validated records and dense measure selection.
//! - [`outliers`]: IQR fence on first-pass scores.
//! - [`requirement`]: truncation and annualization of inefficiency.
//! - [`orchestrator`]: the two-pass state machine and [`run`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Column and configuration errors surface before any estimation.
//! - Whole-pass failures are returned, never retried.
pub mod dataset;
pub mod errors;
pub mod orchestrator;
pub mod outliers;
pub mod requirement;

pub use self::dataset::{DmuDataset, DmuRecord, Selection};
pub use self::errors::{OutlierError, Pass, PipelineError, PipelineResult, RequirementError};
pub use self::orchestrator::{
    run, ExcludedPolicy, PipelineConfig, PipelineDiagnostics, PipelineOutput, ResultRow,
    ResultTable, Stage,
};
pub use self::outliers::{detect, detect_with, OutlierDirection, OutlierOptions};
pub use self::requirement::{
    annualize, RequirementConfig, RequirementPolicy, RequirementTransform, TruncationBounds,
};

pub mod prelude {
    pub use super::{
        run, DmuDataset, DmuRecord, ExcludedPolicy, PipelineConfig, PipelineError,
        PipelineResult, RequirementConfig, RequirementPolicy, ResultTable, TruncationBounds,
    };
}
