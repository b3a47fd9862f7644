//! pipeline::dataset — validated DMU records and measure selection.
//!
//! A [`DmuDataset`] is built once and never mutated. [`DmuDataset::select`]
//! turns a list of input and output measure names into the dense matrices
//! the estimators consume; missing values become `NaN` so the estimators
//! mark the row unscorable. What-if runs build a new dataset with
//! [`DmuDataset::with_replaced_measures`].
use crate::frontier::validation::row_is_scorable;
use crate::pipeline::errors::{PipelineError, PipelineResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmuRecord {
    /// Stable unit identifier.
    pub dmu: String,
    /// Grouping key (network owner).
    pub re_id: String,
    /// Display name; comparisons join on this.
    pub name: String,
    pub measures: BTreeMap<String, Option<f64>>,
}

impl DmuRecord {
    pub fn new(dmu: impl Into<String>, re_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { dmu: dmu.into(), re_id: re_id.into(), name: name.into(), measures: BTreeMap::new() }
    }

    pub fn with_measure(mut self, key: impl Into<String>, value: Option<f64>) -> Self {
        self.measures.insert(key.into(), value);
        self
    }

    /// Value of `key`; `None` when absent or missing.
    pub fn measure(&self, key: &str) -> Option<f64> {
        self.measures.get(key).copied().flatten()
    }
}

/// Dense view of the selected measures, row-aligned with the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub inputs: Array2<f64>,
    pub outputs: Array2<f64>,
    /// `true` where every selected measure is finite and strictly positive.
    pub scorable: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmuDataset {
    records: Vec<DmuRecord>,
}

impl DmuDataset {
    /// # Errors
    /// [`PipelineError::EmptyDataset`] or [`PipelineError::DuplicateDmu`].
    pub fn new(records: Vec<DmuRecord>) -> PipelineResult<Self> {
        if records.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        let mut seen = HashSet::with_capacity(records.len());
        for r in &records {
            if !seen.insert(r.dmu.as_str()) {
                return Err(PipelineError::DuplicateDmu { dmu: r.dmu.clone() });
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[DmuRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DmuRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Build input/output matrices for the named measures.
    ///
    /// # Errors
    /// - [`PipelineError::NoMeasuresSelected`] for an empty list.
    /// - [`PipelineError::MissingColumn`] naming every measure that no
    ///   record carries.
    pub fn select(&self, inputs: &[String], outputs: &[String]) -> PipelineResult<Selection> {
        if inputs.is_empty() {
            return Err(PipelineError::NoMeasuresSelected { side: "input" });
        }
        if outputs.is_empty() {
            return Err(PipelineError::NoMeasuresSelected { side: "output" });
        }
        let missing: Vec<String> = inputs
            .iter()
            .chain(outputs)
            .filter(|key| !self.records.iter().any(|r| r.measures.contains_key(key.as_str())))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingColumn { columns: missing });
        }

        let x = self.matrix(inputs);
        let y = self.matrix(outputs);
        let scorable = (0..self.len()).map(|i| row_is_scorable(x.view(), y.view(), i)).collect();
        Ok(Selection { inputs: x, outputs: y, scorable })
    }

    fn matrix(&self, keys: &[String]) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), keys.len()), |(i, k)| {
            self.records[i].measure(&keys[k]).unwrap_or(f64::NAN)
        })
    }

    /// New dataset with `overrides` applied to the record named `name`.
    ///
    /// # Errors
    /// [`PipelineError::UnknownDmu`] when no record has that name.
    pub fn with_replaced_measures(
        &self, name: &str, overrides: &BTreeMap<String, f64>,
    ) -> PipelineResult<Self> {
        let idx = self
            .records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| PipelineError::UnknownDmu { name: name.to_string() })?;
        let mut records = self.records.clone();
        for (key, value) in overrides {
            records[idx].measures.insert(key.clone(), Some(*value));
        }
        Ok(Self { records })
    }
}
