//! Shape checks and scorable-row bookkeeping shared by the estimators.
//!
//! A row is scorable when every input and output is finite and strictly
//! positive. Estimators fit on scorable rows only and [`scatter`] the
//! results back to full length with `None` elsewhere.
use crate::frontier::{
    errors::{EstimatorError, EstimatorResult},
    Scores,
};
use ndarray::{Array2, ArrayView2, Axis};

pub fn check_shapes(inputs: ArrayView2<f64>, outputs: ArrayView2<f64>) -> EstimatorResult<()> {
    if inputs.nrows() != outputs.nrows() {
        return Err(EstimatorError::ShapeMismatch {
            input_rows: inputs.nrows(),
            output_rows: outputs.nrows(),
        });
    }
    if inputs.ncols() == 0 {
        return Err(EstimatorError::NoMeasures { side: "input" });
    }
    if outputs.ncols() == 0 {
        return Err(EstimatorError::NoMeasures { side: "output" });
    }
    Ok(())
}

pub fn row_is_scorable(inputs: ArrayView2<f64>, outputs: ArrayView2<f64>, i: usize) -> bool {
    let ok = |v: &f64| v.is_finite() && *v > 0.0;
    inputs.row(i).iter().all(ok) && outputs.row(i).iter().all(ok)
}

/// Indices of scorable rows, ascending.
pub fn scorable_rows(inputs: ArrayView2<f64>, outputs: ArrayView2<f64>) -> Vec<usize> {
    (0..inputs.nrows()).filter(|&i| row_is_scorable(inputs, outputs, i)).collect()
}

pub fn require_population(found: usize, required: usize) -> EstimatorResult<()> {
    if found < required {
        return Err(EstimatorError::InsufficientDmus { required, found });
    }
    Ok(())
}

/// Copy of `m` restricted to `rows`.
pub fn take_rows(m: ArrayView2<f64>, rows: &[usize]) -> Array2<f64> {
    m.select(Axis(0), rows)
}

/// Full-length score vector with `values[k]` at `rows[k]`.
pub fn scatter(n: usize, rows: &[usize], values: &[Option<f64>]) -> Scores {
    let mut scores: Scores = vec![None; n];
    for (&row, value) in rows.iter().zip(values.iter()) {
        scores[row] = *value;
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Zero, negative and NaN measures make a row unscorable.
    fn scorable_rows_skip_non_positive_and_nan() {
        let inputs = array![[1.0], [0.0], [2.0], [f64::NAN]];
        let outputs = array![[1.0], [1.0], [-1.0], [1.0]];

        assert_eq!(scorable_rows(inputs.view(), outputs.view()), vec![0]);
    }

    #[test]
    // Purpose
    // -------
    // Shape validation names the failing side.
    fn check_shapes_reports_mismatch_and_empty_side() {
        let a = Array2::<f64>::ones((3, 1));
        let b = Array2::<f64>::ones((2, 1));
        let empty = Array2::<f64>::ones((3, 0));

        assert!(matches!(
            check_shapes(a.view(), b.view()),
            Err(EstimatorError::ShapeMismatch { input_rows: 3, output_rows: 2 })
        ));
        assert_eq!(
            check_shapes(a.view(), empty.view()),
            Err(EstimatorError::NoMeasures { side: "output" })
        );
    }

    #[test]
    // Purpose
    // -------
    // Scattering fills the listed rows and leaves the rest `None`.
    fn scatter_places_values_by_row() {
        let scores = scatter(4, &[1, 3], &[Some(0.5), None]);

        assert_eq!(scores, vec![None, Some(0.5), None, None]);
    }
}
