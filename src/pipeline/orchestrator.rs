//! pipeline::orchestrator — outlier-robust two-pass estimation.
//!
//! Purpose
//! -------
//! Run one estimator over a dataset, drop first-pass outliers, re-estimate
//! on the retained DMUs and turn the merged scores into requirements.
//!
//! Key behaviors
//! -------------
//! - [`Stage`] is the explicit state machine
//!   `FirstPass → Filtered → SecondPass`; [`Stage::advance`] performs one
//!   transition and [`run`] drives it to the terminal state.
//! - Outlier flags come from the first pass only and are never recomputed.
//! - Excluded DMUs are treated by the single configured [`ExcludedPolicy`].
//! - With the filter disabled the first pass is final for every DMU.
//!
//! Invariants & assumptions
//! ------------------------
//! - The dataset is never mutated; every stage builds new vectors.
//! - DMUs whose selected measures are missing or non-positive are never
//!   estimated, never flagged, and carry no score or requirement.
//! - A second pass below the estimator minimum is an error; there is no
//!   silent fallback to first-pass scores.
//! - Percentile requirements use the retained second-pass scores as their
//!   population.
use crate::frontier::{Estimator, FrontierEstimator, Scores};
use crate::pipeline::{
    dataset::{DmuDataset, Selection},
    errors::{Pass, PipelineError, PipelineResult, RequirementError},
    outliers::{detect_with, OutlierFence, OutlierOptions},
    requirement::{RequirementConfig, RequirementTransform},
};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Treatment of DMUs removed by the outlier filter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludedPolicy {
    /// No score and no requirement.
    #[default]
    Unscored,
    /// No score; the requirement is exactly this value.
    FixedRequirement(f64),
    /// Keep the first-pass score and derive the requirement from it.
    FirstPassScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub estimator: Estimator,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub outlier_filter: bool,
    pub outlier_options: OutlierOptions,
    pub excluded_policy: ExcludedPolicy,
    pub requirement: RequirementConfig,
}

impl PipelineConfig {
    /// Filter enabled, default fence, unscored exclusions, default
    /// requirement rule.
    pub fn new(estimator: Estimator, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            estimator,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            outlier_filter: true,
            outlier_options: OutlierOptions::default(),
            excluded_policy: ExcludedPolicy::default(),
            requirement: RequirementConfig::default(),
        }
    }

    pub fn with_outlier_filter(mut self, enabled: bool) -> Self {
        self.outlier_filter = enabled;
        self
    }

    pub fn with_excluded_policy(mut self, policy: ExcludedPolicy) -> Self {
        self.excluded_policy = policy;
        self
    }

    pub fn with_requirement(mut self, requirement: RequirementConfig) -> Self {
        self.requirement = requirement;
        self
    }

    /// # Errors
    /// [`RequirementError::InvalidFallback`] for a non-finite fixed
    /// requirement; [`PipelineError::NoMeasuresSelected`] for empty lists.
    pub fn validate(&self) -> PipelineResult<()> {
        if let ExcludedPolicy::FixedRequirement(r) = self.excluded_policy {
            if !r.is_finite() {
                return Err(RequirementError::InvalidFallback { value: r }.into());
            }
        }
        if self.inputs.is_empty() {
            return Err(PipelineError::NoMeasuresSelected { side: "input" });
        }
        if self.outputs.is_empty() {
            return Err(PipelineError::NoMeasuresSelected { side: "output" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub dmu: String,
    pub re_id: String,
    pub name: String,
    pub inputs: BTreeMap<String, Option<f64>>,
    pub outputs: BTreeMap<String, Option<f64>>,
    /// Final score capped at 1.
    pub efficiency: Option<f64>,
    /// Uncapped final score for estimators that report super-efficiency.
    pub super_efficiency: Option<f64>,
    pub is_outlier: bool,
    pub requirement: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub model: String,
    pub config: PipelineConfig,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn row_by_name(&self, name: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}

/// What happened along the way, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDiagnostics {
    pub first_pass: Scores,
    pub fence: Option<OutlierFence>,
    pub unscorable: usize,
    pub retained: usize,
    pub excluded: usize,
    /// Percentile requirements fell back to absolute truncation.
    pub requirement_fell_back: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub table: ResultTable,
    pub diagnostics: PipelineDiagnostics,
}

/// First-pass scores over the scorable DMUs.
#[derive(Debug, Clone)]
pub struct FirstPass {
    selection: Selection,
    first: Scores,
}

/// Outlier mask fixed from the first pass.
#[derive(Debug, Clone)]
pub struct Filtered {
    selection: Selection,
    first: Scores,
    outlier: Vec<bool>,
    fence: Option<OutlierFence>,
}

/// Merged final scores; terminal.
#[derive(Debug, Clone)]
pub struct SecondPass {
    selection: Selection,
    first: Scores,
    outlier: Vec<bool>,
    fence: Option<OutlierFence>,
    scores: Scores,
    /// Scores that define the percentile population.
    reference: Scores,
}

#[derive(Debug, Clone)]
pub enum Stage {
    FirstPass(FirstPass),
    Filtered(Filtered),
    SecondPass(SecondPass),
}

impl Stage {
    /// Select measures and run the first pass.
    ///
    /// # Errors
    /// Column, configuration and first-pass estimator errors.
    pub fn start(dataset: &DmuDataset, config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let selection = dataset.select(&config.inputs, &config.outputs)?;
        let scorable = selection.scorable.iter().filter(|s| **s).count();
        info!(
            model = config.estimator.name(),
            dmus = dataset.len(),
            scorable,
            "first pass"
        );
        let first = config
            .estimator
            .estimate(selection.inputs.view(), selection.outputs.view())
            .map_err(|source| PipelineError::Estimator { pass: Pass::First, source })?;
        Ok(Stage::FirstPass(FirstPass { selection, first }))
    }

    /// Perform one transition. The terminal stage is returned unchanged.
    pub fn advance(self, config: &PipelineConfig) -> PipelineResult<Self> {
        match self {
            Stage::FirstPass(state) => state.filter(config).map(Stage::Filtered),
            Stage::Filtered(state) => state.second_pass(config).map(Stage::SecondPass),
            terminal @ Stage::SecondPass(_) => Ok(terminal),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::SecondPass(_))
    }
}

impl FirstPass {
    fn filter(self, config: &PipelineConfig) -> PipelineResult<Filtered> {
        let n = self.first.len();
        if !config.outlier_filter {
            debug!("outlier filter disabled");
            return Ok(Filtered {
                selection: self.selection,
                first: self.first,
                outlier: vec![false; n],
                fence: None,
            });
        }
        let rows: Vec<usize> = (0..n).filter(|&i| self.selection.scorable[i]).collect();
        let candidate: Vec<Option<f64>> = rows.iter().map(|&i| self.first[i]).collect();
        let report = detect_with(
            &candidate,
            config.estimator.outlier_direction(),
            &config.outlier_options,
        )?;
        let mut outlier = vec![false; n];
        for (&row, flagged) in rows.iter().zip(report.mask) {
            outlier[row] = flagged;
        }
        info!(
            flagged = outlier.iter().filter(|o| **o).count(),
            fence = report.fence.fence,
            "outlier filter applied"
        );
        Ok(Filtered { selection: self.selection, first: self.first, outlier, fence: Some(report.fence) })
    }
}

impl Filtered {
    fn second_pass(self, config: &PipelineConfig) -> PipelineResult<SecondPass> {
        let excluded = self.outlier.iter().filter(|o| **o).count();
        if excluded == 0 {
            let reference = self.first.clone();
            return Ok(SecondPass {
                scores: self.first.clone(),
                reference,
                selection: self.selection,
                first: self.first,
                outlier: self.outlier,
                fence: self.fence,
            });
        }

        let retained: Vec<usize> = (0..self.first.len())
            .filter(|&i| self.selection.scorable[i] && !self.outlier[i])
            .collect();
        if retained.is_empty() {
            return Err(PipelineError::EmptyRetainedSet);
        }
        info!(retained = retained.len(), excluded, "second pass");
        let x = self.selection.inputs.select(Axis(0), &retained);
        let y = self.selection.outputs.select(Axis(0), &retained);
        let second = config
            .estimator
            .estimate(x.view(), y.view())
            .map_err(|source| PipelineError::Estimator { pass: Pass::Second, source })?;

        let mut scores: Scores = vec![None; self.first.len()];
        let mut reference: Scores = vec![None; self.first.len()];
        for (&row, score) in retained.iter().zip(second) {
            scores[row] = score;
            reference[row] = score;
        }
        if config.excluded_policy == ExcludedPolicy::FirstPassScore {
            for (i, flagged) in self.outlier.iter().enumerate() {
                if *flagged {
                    scores[i] = self.first[i];
                }
            }
        }
        Ok(SecondPass {
            selection: self.selection,
            first: self.first,
            outlier: self.outlier,
            fence: self.fence,
            scores,
            reference,
        })
    }
}

impl SecondPass {
    fn into_output(self, dataset: &DmuDataset, config: &PipelineConfig) -> PipelineOutput {
        let transform = RequirementTransform::fit(&config.requirement, &self.reference);
        let super_eff = config.estimator.reports_super_efficiency();

        let rows: Vec<ResultRow> = dataset
            .records()
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let score = self.scores[i].filter(|s| s.is_finite());
                let requirement = match (self.outlier[i], config.excluded_policy) {
                    (true, ExcludedPolicy::Unscored) => None,
                    (true, ExcludedPolicy::FixedRequirement(r)) => Some(r),
                    _ => score.map(|s| transform.derive(s)),
                };
                let pick = |keys: &[String]| -> BTreeMap<String, Option<f64>> {
                    keys.iter().map(|k| (k.clone(), record.measure(k))).collect()
                };
                ResultRow {
                    dmu: record.dmu.clone(),
                    re_id: record.re_id.clone(),
                    name: record.name.clone(),
                    inputs: pick(&config.inputs),
                    outputs: pick(&config.outputs),
                    efficiency: score.map(|s| s.min(1.0)),
                    super_efficiency: if super_eff { score } else { None },
                    is_outlier: self.outlier[i],
                    requirement,
                }
            })
            .collect();

        let excluded = self.outlier.iter().filter(|o| **o).count();
        let unscorable = self.selection.scorable.iter().filter(|s| !**s).count();
        let diagnostics = PipelineDiagnostics {
            first_pass: self.first,
            fence: self.fence,
            unscorable,
            retained: self.selection.scorable.len() - unscorable - excluded,
            excluded,
            requirement_fell_back: transform.fell_back,
        };
        PipelineOutput {
            table: ResultTable {
                model: config.estimator.name().to_string(),
                config: config.clone(),
                rows,
            },
            diagnostics,
        }
    }
}

/// Run the whole pipeline.
///
/// # Errors
/// Any [`PipelineError`]; nothing is retried.
pub fn run(dataset: &DmuDataset, config: &PipelineConfig) -> PipelineResult<PipelineOutput> {
    let mut stage = Stage::start(dataset, config)?;
    while !stage.is_terminal() {
        stage = stage.advance(config)?;
    }
    match stage {
        Stage::SecondPass(done) => {
            let output = done.into_output(dataset, config);
            info!(
                model = %output.table.model,
                excluded = output.diagnostics.excluded,
                "pipeline finished"
            );
            Ok(output)
        }
        _ => Err(PipelineError::InvalidConfig {
            reason: "pipeline stopped before its terminal stage".to_string(),
        }),
    }
}
