//! runs::scenario — what-if rerun for one DMU.
//!
//! Replaces some of one DMU's measures, rebuilds the dataset (the original
//! is left untouched), reruns the whole pipeline and reports that DMU's new
//! position. The rerun builds a fresh frontier from the changed data, so
//! its result is not directly comparable with the baseline run; the
//! baseline row is carried alongside for display only.
use crate::pipeline::{
    dataset::DmuDataset,
    orchestrator::{run, PipelineConfig, ResultRow, ResultTable},
};
use crate::runs::errors::{RunError, RunResult};
use crate::runs::summary::RequirementBase;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    pub efficiency: Option<f64>,
    pub requirement: Option<f64>,
    /// Requirement priced on the changed measures.
    pub requirement_amount: Option<f64>,
    pub is_outlier: bool,
    /// The DMU's row in the run the scenario started from.
    pub baseline: Option<ResultRow>,
    pub table: ResultTable,
}

/// Rerun `config` with `overrides` applied to the DMU called `name`.
///
/// # Errors
/// - [`RunError::Pipeline`] wrapping [`UnknownDmu`](crate::pipeline::PipelineError::UnknownDmu)
///   or any failure of the rerun.
/// - [`RunError::UnknownDmu`] if the rerun table lacks the DMU.
pub fn simulate(
    dataset: &DmuDataset, config: &PipelineConfig, name: &str, overrides: &BTreeMap<String, f64>,
    baseline: Option<&ResultTable>, base: &RequirementBase,
) -> RunResult<ScenarioOutcome> {
    let changed = dataset.with_replaced_measures(name, overrides)?;
    info!(dmu = name, changed = overrides.len(), "running what-if scenario");
    let output = run(&changed, config)?;

    let row = output
        .table
        .row_by_name(name)
        .cloned()
        .ok_or_else(|| RunError::UnknownDmu { name: name.to_string() })?;
    let base_value = changed.find_by_name(name).and_then(|r| base.of_record(r));

    Ok(ScenarioOutcome {
        name: name.to_string(),
        efficiency: row.efficiency,
        requirement: row.requirement,
        requirement_amount: row.requirement.zip(base_value).map(|(r, b)| r * b),
        is_outlier: row.is_outlier,
        baseline: baseline.and_then(|t| t.row_by_name(name).cloned()),
        table: output.table,
    })
}
