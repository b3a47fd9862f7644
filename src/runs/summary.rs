//! runs::summary — ranked requirement table for reporting.
//!
//! Ranks the final efficiencies of one run (ascending, ties share the
//! lowest rank), turns the average-rank percentile into a relative
//! efficiency, and prices the resulting absolute-policy requirement against
//! a cost base.
use crate::pipeline::{
    dataset::{DmuDataset, DmuRecord},
    orchestrator::ResultTable,
    requirement::{derive, Scaling, TruncationBounds},
};
use crate::runs::errors::{RunError, RunResult};
use serde::{Deserialize, Serialize};

/// Cost base the requirement amount is computed on. Defaults to
/// `Measure("OPEXp")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementBase {
    /// `OPEXp + CAPEX`.
    Totex,
    /// A single named measure, e.g. `OPEXp`.
    Measure(String),
}

pub const OPEX: &str = "OPEXp";
pub const CAPEX: &str = "CAPEX";

impl Default for RequirementBase {
    fn default() -> Self {
        RequirementBase::Measure(OPEX.to_string())
    }
}

impl RequirementBase {
    fn label(&self) -> String {
        match self {
            RequirementBase::Totex => "TOTEX".to_string(),
            RequirementBase::Measure(m) => m.clone(),
        }
    }

    fn value(&self, dataset: &DmuDataset, dmu: &str) -> Option<f64> {
        self.of_record(dataset.records().iter().find(|r| r.dmu == dmu)?)
    }

    /// Base amount for one record; `None` if a component measure is missing.
    pub(crate) fn of_record(&self, record: &DmuRecord) -> Option<f64> {
        match self {
            RequirementBase::Totex => Some(record.measure(OPEX)? + record.measure(CAPEX)?),
            RequirementBase::Measure(m) => record.measure(m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub name: String,
    /// 1 = least efficient.
    pub rank: Option<usize>,
    /// Average rank over the number of ranked DMUs, in `(0, 1]`.
    pub percentile: Option<f64>,
    pub efficiency: Option<f64>,
    pub relative_efficiency: Option<f64>,
    pub requirement: Option<f64>,
    /// `base × requirement` in currency units.
    pub requirement_amount: Option<f64>,
}

/// Ranked summary of `table` in its original row order.
///
/// # Errors
/// [`RunError::MissingBaseMeasure`] when a ranked DMU has no value for the
/// requirement base.
pub fn ranked_summary(
    table: &ResultTable, dataset: &DmuDataset, bounds: &TruncationBounds, base: &RequirementBase,
) -> RunResult<Vec<SummaryRow>> {
    let values: Vec<f64> = table.rows.iter().filter_map(|r| r.efficiency).collect();
    let n = values.len() as f64;

    table
        .rows
        .iter()
        .map(|row| {
            let Some(eff) = row.efficiency else {
                return Ok(SummaryRow {
                    name: row.name.clone(),
                    rank: None,
                    percentile: None,
                    efficiency: None,
                    relative_efficiency: None,
                    requirement: None,
                    requirement_amount: None,
                });
            };
            let below = values.iter().filter(|v| **v < eff).count();
            let ties = values.iter().filter(|v| **v == eff).count();
            let average_rank = below as f64 + (ties as f64 + 1.0) / 2.0;
            let percentile = average_rank / n;
            let requirement = derive(percentile, bounds, &Scaling::Absolute);
            let amount = base.value(dataset, &row.dmu).ok_or_else(|| RunError::MissingBaseMeasure {
                name: row.name.clone(),
                measure: base.label(),
            })?;
            Ok(SummaryRow {
                name: row.name.clone(),
                rank: Some(below + 1),
                percentile: Some(percentile),
                efficiency: Some(eff),
                relative_efficiency: Some(percentile),
                requirement: Some(requirement),
                requirement_amount: Some(amount * requirement),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::Estimator;
    use crate::pipeline::dataset::DmuRecord;
    use crate::pipeline::orchestrator::{PipelineConfig, ResultRow};
    use crate::pipeline::requirement::annualize;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn fixture(effs: &[Option<f64>]) -> (ResultTable, DmuDataset) {
        let mut rows = Vec::new();
        let mut records = Vec::new();
        for (i, eff) in effs.iter().enumerate() {
            let id = format!("{}", i + 1);
            let name = format!("DMU{}", i + 1);
            rows.push(ResultRow {
                dmu: id.clone(),
                re_id: "RE".into(),
                name: name.clone(),
                inputs: BTreeMap::new(),
                outputs: BTreeMap::new(),
                efficiency: *eff,
                super_efficiency: None,
                is_outlier: false,
                requirement: None,
            });
            records.push(
                DmuRecord::new(id, "RE", name)
                    .with_measure(OPEX, Some(100.0))
                    .with_measure(CAPEX, Some(50.0)),
            );
        }
        let table = ResultTable {
            model: "DEA".into(),
            config: PipelineConfig::new(Estimator::default(), &[OPEX], &["CU"]),
            rows,
        };
        (table, DmuDataset::new(records).expect("dataset"))
    }

    #[test]
    // Purpose
    // -------
    // Ranks use the min method and percentiles the average rank.
    //
    // Given
    // -----
    // - Efficiencies [0.8, 0.6, 0.8, 1.0, None].
    //
    // Expect
    // ------
    // - Ranks [2, 1, 2, 4, None]; percentiles [2.5/4, 1/4, 2.5/4, 1, None].
    // - The top unit gets annualize(min) and an amount on TOTEX = 150.
    fn ranks_ties_and_amounts() {
        // Arrange
        let (table, ds) = fixture(&[Some(0.8), Some(0.6), Some(0.8), Some(1.0), None]);
        let bounds = TruncationBounds::default();

        // Act
        let summary = ranked_summary(&table, &ds, &bounds, &RequirementBase::Totex).expect("summary");

        // Assert
        let ranks: Vec<Option<usize>> = summary.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![Some(2), Some(1), Some(2), Some(4), None]);
        assert_relative_eq!(summary[0].percentile.unwrap(), 0.625, epsilon = 1e-12);
        assert_relative_eq!(summary[1].percentile.unwrap(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(summary[3].requirement.unwrap(), annualize(0.162416), epsilon = 1e-12);
        assert_relative_eq!(
            summary[3].requirement_amount.unwrap(),
            150.0 * annualize(0.162416),
            epsilon = 1e-9
        );
        assert_relative_eq!(summary[1].requirement.unwrap(), annualize(0.3), epsilon = 1e-12);
        assert_eq!(summary[4].requirement_amount, None);
    }

    #[test]
    // Purpose
    // -------
    // Without an explicit base, requirements are priced on operating cost.
    fn default_base_is_operating_cost() {
        let (table, ds) = fixture(&[Some(0.7), Some(0.9)]);

        let summary = ranked_summary(
            &table,
            &ds,
            &TruncationBounds::default(),
            &RequirementBase::default(),
        )
        .expect("summary");

        assert_eq!(RequirementBase::default(), RequirementBase::Measure(OPEX.into()));
        assert_relative_eq!(
            summary[0].requirement_amount.unwrap(),
            100.0 * summary[0].requirement.unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    // Purpose
    // -------
    // A ranked DMU without the base measure is an error.
    fn missing_base_measure_is_reported() {
        let (table, ds) = fixture(&[Some(0.8), Some(0.9)]);

        let err = ranked_summary(
            &table,
            &ds,
            &TruncationBounds::default(),
            &RequirementBase::Measure("NS".into()),
        )
        .expect_err("no NS measure");

        assert_eq!(err, RunError::MissingBaseMeasure { name: "DMU1".into(), measure: "NS".into() });
    }
}
