//! pipeline::outliers — IQR fence on first-pass scores.
//!
//! Quartiles are linear-interpolation percentiles of the finite scores.
//! For [`OutlierDirection::Upper`] the fence is `Q3 + k·IQR` and scores
//! strictly above it are flagged; for [`OutlierDirection::Lower`] it is
//! `Q1 − k·IQR` and scores strictly below are flagged. Missing and
//! non-finite scores are always flagged. `k` defaults to 2.
use crate::pipeline::errors::{OutlierError, OutlierResult};
use crate::utils::{finite_values, percentile_sorted};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fewest finite scores for which quartiles are meaningful.
pub const MIN_FINITE_SCORES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierDirection {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierOptions {
    pub iqr_multiplier: f64,
}

impl OutlierOptions {
    pub fn new(iqr_multiplier: f64) -> OutlierResult<Self> {
        if !iqr_multiplier.is_finite() || iqr_multiplier < 0.0 {
            return Err(OutlierError::InvalidMultiplier { value: iqr_multiplier });
        }
        Ok(Self { iqr_multiplier })
    }
}

impl Default for OutlierOptions {
    fn default() -> Self {
        Self { iqr_multiplier: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierFence {
    pub q1: f64,
    pub q3: f64,
    pub fence: f64,
    pub direction: OutlierDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub mask: Vec<bool>,
    pub fence: OutlierFence,
}

/// Outlier mask with the default multiplier.
pub fn detect(scores: &[Option<f64>], direction: OutlierDirection) -> OutlierResult<Vec<bool>> {
    Ok(detect_with(scores, direction, &OutlierOptions::default())?.mask)
}

/// Outlier mask and the fence that produced it.
///
/// # Errors
/// [`OutlierError::InsufficientData`] with fewer than
/// [`MIN_FINITE_SCORES`] finite scores.
pub fn detect_with(
    scores: &[Option<f64>], direction: OutlierDirection, options: &OutlierOptions,
) -> OutlierResult<OutlierReport> {
    let mut finite = finite_values(scores);
    if finite.len() < MIN_FINITE_SCORES {
        return Err(OutlierError::InsufficientData {
            found: finite.len(),
            required: MIN_FINITE_SCORES,
        });
    }
    finite.sort_by(f64::total_cmp);
    let q1 = percentile_sorted(&finite, 25.0);
    let q3 = percentile_sorted(&finite, 75.0);
    let spread = options.iqr_multiplier * (q3 - q1);
    let fence = match direction {
        OutlierDirection::Upper => q3 + spread,
        OutlierDirection::Lower => q1 - spread,
    };

    let mask: Vec<bool> = scores
        .iter()
        .map(|s| match s {
            Some(v) if v.is_finite() => match direction {
                OutlierDirection::Upper => *v > fence,
                OutlierDirection::Lower => *v < fence,
            },
            _ => true,
        })
        .collect();
    debug!(q1, q3, fence, flagged = mask.iter().filter(|m| **m).count(), "outlier fence");
    Ok(OutlierReport { mask, fence: OutlierFence { q1, q3, fence, direction } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // A single super-efficient DEA score far above the rest is the only
    // upper-fence outlier.
    //
    // Given
    // -----
    // - Scores [0.9, 0.92, 0.95, 0.97, 2.5].
    //
    // Expect
    // ------
    // - Q1 = 0.92, Q3 = 0.97, fence = 1.07; only 2.5 flagged.
    fn upper_fence_flags_single_super_efficient_unit() {
        // Arrange
        let scores = vec![Some(0.9), Some(0.92), Some(0.95), Some(0.97), Some(2.5)];

        // Act
        let report =
            detect_with(&scores, OutlierDirection::Upper, &OutlierOptions::default()).expect("fence");

        // Assert
        assert_relative_eq!(report.fence.q1, 0.92, epsilon = 1e-12);
        assert_relative_eq!(report.fence.q3, 0.97, epsilon = 1e-12);
        assert_relative_eq!(report.fence.fence, 1.07, epsilon = 1e-12);
        assert_eq!(report.mask, vec![false, false, false, false, true]);
    }

    #[test]
    // Purpose
    // -------
    // Lower fence for SFA/CNLS, with missing scores always flagged.
    fn lower_fence_flags_low_and_missing_scores() {
        let scores = vec![Some(0.8), Some(0.82), Some(0.85), Some(0.87), Some(0.2), None];

        let mask = detect(&scores, OutlierDirection::Lower).expect("fence");

        assert_eq!(mask, vec![false, false, false, false, true, true]);
    }

    #[test]
    // Purpose
    // -------
    // Fewer than four finite scores cannot form a fence.
    fn too_few_scores_is_insufficient_data() {
        let scores = vec![Some(1.0), Some(f64::NAN), Some(0.5), None, Some(0.7)];

        assert_eq!(
            detect(&scores, OutlierDirection::Upper),
            Err(OutlierError::InsufficientData { found: 3, required: 4 })
        );
    }

    #[test]
    // Purpose
    // -------
    // A tighter multiplier flags more; invalid multipliers are rejected.
    fn multiplier_controls_fence_width() {
        let scores = vec![Some(0.9), Some(0.92), Some(0.95), Some(0.97), Some(1.02)];
        let tight = OutlierOptions::new(0.5).expect("options");

        let default_mask = detect(&scores, OutlierDirection::Upper).expect("default");
        let tight_mask = detect_with(&scores, OutlierDirection::Upper, &tight).expect("tight").mask;

        assert!(!default_mask[4]);
        assert!(tight_mask[4]);
        assert!(OutlierOptions::new(-1.0).is_err());
    }
}
