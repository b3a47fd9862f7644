//! frontier::sfa::external — stochastic frontier fitted by an external program.
//!
//! The regulator's reference fits come from an R session (`frontier::sfa`
//! with a truncated-normal inefficiency term). This module is the only place
//! the crate crosses a process boundary, and it does so synchronously:
//!
//! 1. write `handoff.csv` (`ln_y, ln_x1, …, ln_xk`) into a fresh temp dir,
//! 2. run `program args… <handoff.csv> <result.csv>` and block until exit,
//! 3. read `result.csv`, which must carry an `inefficiency` column with one
//!    row per handoff row.
//!
//! Empty or `NA` cells become `None` for that DMU. There is no retry: a
//! non-zero exit is [`EstimatorError::ExternalProcess`] and any unusable
//! output is [`EstimatorError::MalformedOutput`].
use crate::frontier::errors::{EstimatorError, EstimatorResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

const INPUT_FILE: &str = "handoff.csv";
const OUTPUT_FILE: &str = "result.csv";
const INEFFICIENCY_COLUMN: &str = "inefficiency";

/// Program and leading arguments, e.g. `Rscript` with `["sfa_fit.R"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> EstimatorResult<Self> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(EstimatorError::InvalidConfig {
                reason: "external SFA program must not be empty".to_string(),
            });
        }
        Ok(Self { program, args })
    }
}

/// Hand `(ln_y, ln_x)` to the external program and read back `u` per row.
pub fn fit_inefficiency(
    command: &ExternalCommand, ln_y: &Array1<f64>, ln_x: &Array2<f64>,
) -> EstimatorResult<Vec<Option<f64>>> {
    let workdir = tempfile::tempdir()?;
    let input = workdir.path().join(INPUT_FILE);
    let output = workdir.path().join(OUTPUT_FILE);
    write_handoff(&input, ln_y, ln_x)?;

    info!(program = %command.program, rows = ln_y.len(), "running external SFA program");
    let result = Command::new(&command.program)
        .args(&command.args)
        .arg(&input)
        .arg(&output)
        .output()
        .map_err(|e| EstimatorError::ExternalProcess {
            program: command.program.clone(),
            code: None,
            stderr: e.to_string(),
        })?;
    if !result.status.success() {
        return Err(EstimatorError::ExternalProcess {
            program: command.program.clone(),
            code: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    debug!(stdout = %String::from_utf8_lossy(&result.stdout).trim(), "external SFA finished");

    read_result(&output, ln_y.len())
}

fn write_handoff(path: &Path, ln_y: &Array1<f64>, ln_x: &Array2<f64>) -> EstimatorResult<()> {
    let io_err = |e: csv::Error| EstimatorError::Io { reason: e.to_string() };
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;
    let mut header = vec!["ln_y".to_string()];
    header.extend((1..=ln_x.ncols()).map(|k| format!("ln_x{k}")));
    writer.write_record(&header).map_err(io_err)?;
    for (i, y) in ln_y.iter().enumerate() {
        let mut record = vec![y.to_string()];
        record.extend(ln_x.row(i).iter().map(f64::to_string));
        writer.write_record(&record).map_err(io_err)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_result(path: &Path, expected_rows: usize) -> EstimatorResult<Vec<Option<f64>>> {
    if !path.exists() {
        return Err(EstimatorError::MalformedOutput {
            reason: format!("program did not write {OUTPUT_FILE}"),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(INEFFICIENCY_COLUMN))
        .ok_or_else(|| EstimatorError::MalformedOutput {
            reason: format!("missing '{INEFFICIENCY_COLUMN}' column"),
        })?;

    let mut values = Vec::with_capacity(expected_rows);
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = record.get(column).unwrap_or("").trim();
        values.push(parse_inefficiency(cell, row)?);
    }
    if values.len() != expected_rows {
        return Err(EstimatorError::MalformedOutput {
            reason: format!("expected {expected_rows} rows, found {}", values.len()),
        });
    }
    Ok(values)
}

fn parse_inefficiency(cell: &str, row: usize) -> EstimatorResult<Option<f64>> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    let value: f64 = cell.parse().map_err(|_| EstimatorError::MalformedOutput {
        reason: format!("row {row}: '{cell}' is not a number"),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(EstimatorError::MalformedOutput {
            reason: format!("row {row}: inefficiency {value} must be finite and non-negative"),
        });
    }
    Ok(Some(value))
}
