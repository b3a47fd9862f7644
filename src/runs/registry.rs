//! runs::registry — append-only store of immutable run records.
//!
//! Purpose
//! -------
//! Keep every finished [`ResultTable`] together with the configuration and
//! timestamp that produced it, and compare two runs DMU by DMU.
//!
//! Key behaviors
//! -------------
//! - Ids are `"<model lowercase>_<YYYY-mm-dd_HH-MM-SS>"`; a second run in
//!   the same second gets `_2`, `_3`, … appended.
//! - Records are never modified or removed once registered.
//! - [`RunRecord::to_json`] / [`RunRecord::from_json`] give the persisted
//!   form `{ id, model, timestamp, config, table }`.
//! - [`RunRegistry::compare`] inner-joins on display name, drops rows
//!   without an efficiency in either run, and sorts by the absolute
//!   difference `B − A`, largest first.
use crate::pipeline::orchestrator::{PipelineConfig, ResultTable};
use crate::runs::errors::{RunError, RunResult};
use crate::utils::pearson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

const ID_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub config: PipelineConfig,
    pub table: ResultTable,
}

impl RunRecord {
    pub fn to_json(&self) -> RunResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> RunResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One DMU present in both compared runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    pub efficiency_a: f64,
    pub efficiency_b: f64,
    /// `efficiency_b − efficiency_a`.
    pub diff: f64,
    pub requirement_a: Option<f64>,
    pub requirement_b: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunComparison {
    pub a: RunId,
    pub b: RunId,
    /// `None` with fewer than two common DMUs or zero variance.
    pub correlation: Option<f64>,
    pub rows: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    records: BTreeMap<RunId, RunRecord>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` stamped with the current time.
    pub fn register(&mut self, table: ResultTable) -> RunId {
        self.register_at(table, Utc::now())
    }

    pub fn register_at(&mut self, table: ResultTable, timestamp: DateTime<Utc>) -> RunId {
        let base = format!("{}_{}", table.model.to_lowercase(), timestamp.format(ID_TIME_FORMAT));
        let id = (1..)
            .map(|k| if k == 1 { RunId(base.clone()) } else { RunId(format!("{base}_{k}")) })
            .find(|candidate| !self.records.contains_key(candidate))
            .unwrap_or_else(|| RunId(base.clone()));
        info!(id = %id, rows = table.rows.len(), "run registered");
        let record = RunRecord {
            id: id.clone(),
            model: table.model.clone(),
            timestamp,
            config: table.config.clone(),
            table,
        };
        self.records.insert(id.clone(), record);
        id
    }

    /// Ids in ascending order (chronological within a model).
    pub fn list(&self) -> Vec<&RunId> {
        self.records.keys().collect()
    }

    pub fn get(&self, id: &RunId) -> RunResult<&RunRecord> {
        self.records.get(id).ok_or_else(|| RunError::UnknownRun { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// # Errors
    /// [`RunError::UnknownRun`] or [`RunError::NoCommonDmus`].
    pub fn compare(&self, a: &RunId, b: &RunId) -> RunResult<RunComparison> {
        let table_a = &self.get(a)?.table;
        let table_b = &self.get(b)?.table;

        let mut rows: Vec<ComparisonRow> = table_a
            .rows
            .iter()
            .filter_map(|ra| {
                let rb = table_b.row_by_name(&ra.name)?;
                let (ea, eb) = (ra.efficiency?, rb.efficiency?);
                Some(ComparisonRow {
                    name: ra.name.clone(),
                    efficiency_a: ea,
                    efficiency_b: eb,
                    diff: eb - ea,
                    requirement_a: ra.requirement,
                    requirement_b: rb.requirement,
                })
            })
            .collect();
        if rows.is_empty() {
            return Err(RunError::NoCommonDmus { a: a.to_string(), b: b.to_string() });
        }
        rows.sort_by(|x, y| y.diff.abs().total_cmp(&x.diff.abs()).then_with(|| x.name.cmp(&y.name)));

        let ea: Vec<f64> = rows.iter().map(|r| r.efficiency_a).collect();
        let eb: Vec<f64> = rows.iter().map(|r| r.efficiency_b).collect();
        Ok(RunComparison { a: a.clone(), b: b.clone(), correlation: pearson(&ea, &eb), rows })
    }
}
