//! pipeline::requirement — efficiency score to annual revenue requirement.
//!
//! Purpose
//! -------
//! Convert a (capped) efficiency score into the annualized fractional
//! revenue reduction a regulator imposes over a four-year period.
//!
//! Key behaviors
//! -------------
//! - Inefficiency is `1 − min(score, 1)`.
//! - [`RequirementPolicy::Absolute`] clips inefficiency to the truncation
//!   bounds.
//! - [`RequirementPolicy::Percentile`] maps inefficiency linearly from
//!   `[p10, p90]` of the population onto the bounds, clipping outside.
//!   A population with `p90 == p10` falls back to the absolute policy.
//! - The truncated value `t` becomes `(1 + t/4)^(1/4) − 1` ([`annualize`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Requirements lie in `[annualize(min), annualize(max)]`.
//! - Lower scores never give lower requirements.
//!
//! Testing notes
//! -------------
//! - Boundary, monotonicity and the degenerate-percentile guard are unit
//!   tested below.
use crate::pipeline::errors::{RequirementError, RequirementResult};
use crate::utils::{finite_values, percentile};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_TRUNK_MIN: f64 = 0.162416;
pub const DEFAULT_TRUNK_MAX: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementPolicy {
    #[default]
    Absolute,
    Percentile,
}

impl FromStr for RequirementPolicy {
    type Err = RequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absolut" | "absolute" => Ok(RequirementPolicy::Absolute),
            "percentilbaserat" | "percentile" => Ok(RequirementPolicy::Percentile),
            _ => Err(RequirementError::UnknownPolicy { name: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruncationBounds {
    min: f64,
    max: f64,
}

impl TruncationBounds {
    /// # Errors
    /// [`RequirementError::InvalidBounds`] unless both are finite and
    /// `0 ≤ min ≤ max`.
    pub fn new(min: f64, max: f64) -> RequirementResult<Self> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(RequirementError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl Default for TruncationBounds {
    fn default() -> Self {
        Self { min: DEFAULT_TRUNK_MIN, max: DEFAULT_TRUNK_MAX }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementConfig {
    pub bounds: TruncationBounds,
    pub policy: RequirementPolicy,
}

impl RequirementConfig {
    pub fn new(bounds: TruncationBounds, policy: RequirementPolicy) -> Self {
        Self { bounds, policy }
    }
}

/// Spread a four-year reduction `t` into an annual rate.
pub fn annualize(truncated: f64) -> f64 {
    (1.0 + truncated / 4.0).powf(0.25) - 1.0
}

/// How inefficiency is mapped onto the truncation bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    Absolute,
    /// Inefficiency percentiles of the reference population.
    Percentile { p10: f64, p90: f64 },
}

/// Requirement for one score.
pub fn derive(score: f64, bounds: &TruncationBounds, scaling: &Scaling) -> f64 {
    let inefficiency = 1.0 - score.min(1.0);
    let truncated = match *scaling {
        Scaling::Absolute => bounds.clip(inefficiency),
        Scaling::Percentile { p10, p90 } => {
            let ratio = ((inefficiency - p10) / (p90 - p10)).clamp(0.0, 1.0);
            bounds.min + ratio * (bounds.max - bounds.min)
        }
    };
    annualize(truncated)
}

/// A requirement rule fitted to one population of scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequirementTransform {
    pub bounds: TruncationBounds,
    pub scaling: Scaling,
    /// Percentile policy was requested but the population was degenerate.
    pub fell_back: bool,
}

impl RequirementTransform {
    /// Fix the scaling from `population` (used only by the percentile
    /// policy).
    pub fn fit(config: &RequirementConfig, population: &[Option<f64>]) -> Self {
        let absolute = Self { bounds: config.bounds, scaling: Scaling::Absolute, fell_back: false };
        if config.policy == RequirementPolicy::Absolute {
            return absolute;
        }
        let inefficiency: Vec<f64> =
            finite_values(population).into_iter().map(|s| 1.0 - s.min(1.0)).collect();
        match (percentile(&inefficiency, 10.0), percentile(&inefficiency, 90.0)) {
            (Some(p10), Some(p90)) if p90 > p10 => {
                Self { scaling: Scaling::Percentile { p10, p90 }, ..absolute }
            }
            (p10, p90) => {
                warn!(?p10, ?p90, "degenerate inefficiency percentiles; using absolute truncation");
                Self { fell_back: true, ..absolute }
            }
        }
    }

    pub fn derive(&self, score: f64) -> f64 {
        derive(score, &self.bounds, &self.scaling)
    }

    /// Requirement per score; `None` stays `None`.
    pub fn derive_all(&self, scores: &[Option<f64>]) -> Vec<Option<f64>> {
        scores.iter().map(|s| s.filter(|v| v.is_finite()).map(|v| self.derive(v))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Boundary behavior of the absolute policy.
    //
    // Given
    // -----
    // - Default bounds [0.162416, 0.3].
    //
    // Expect
    // ------
    // - A fully efficient unit (or one above 1) gets annualize(min).
    // - A very inefficient unit gets annualize(max).
    fn absolute_policy_hits_truncation_bounds() {
        // Arrange
        let b = TruncationBounds::default();

        // Act
        let top = derive(1.0, &b, &Scaling::Absolute);
        let super_eff = derive(1.4, &b, &Scaling::Absolute);
        let worst = derive(0.2, &b, &Scaling::Absolute);

        // Assert
        assert_relative_eq!(top, (1.0 + 0.162416 / 4.0_f64).powf(0.25) - 1.0, epsilon = 1e-15);
        assert_eq!(top, super_eff);
        assert_relative_eq!(worst, annualize(0.3), epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Requirements are non-increasing in the score under both policies.
    fn requirement_is_monotone_in_score() {
        let b = TruncationBounds::default();
        let pct = Scaling::Percentile { p10: 0.05, p90: 0.4 };
        let grid: Vec<f64> = (0..=20).map(|i| 0.5 + 0.03 * i as f64).collect();

        for w in grid.windows(2) {
            assert!(derive(w[0], &b, &Scaling::Absolute) >= derive(w[1], &b, &Scaling::Absolute));
            assert!(derive(w[0], &b, &pct) >= derive(w[1], &b, &pct));
        }
    }

    #[test]
    // Purpose
    // -------
    // Percentile policy maps p10 to the lower bound and p90 to the upper.
    fn percentile_policy_spans_bounds() {
        let config = RequirementConfig::new(TruncationBounds::default(), RequirementPolicy::Percentile);
        let population: Vec<Option<f64>> = (0..11).map(|i| Some(1.0 - 0.05 * i as f64)).collect();

        let t = RequirementTransform::fit(&config, &population);

        assert!(!t.fell_back);
        match t.scaling {
            Scaling::Percentile { p10, p90 } => {
                assert_relative_eq!(p10, 0.05, epsilon = 1e-12);
                assert_relative_eq!(p90, 0.45, epsilon = 1e-12);
            }
            Scaling::Absolute => panic!("expected percentile scaling"),
        }
        assert_relative_eq!(t.derive(0.95), annualize(DEFAULT_TRUNK_MIN), epsilon = 1e-12);
        assert_relative_eq!(t.derive(0.55), annualize(DEFAULT_TRUNK_MAX), epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Identical scores make p90 == p10; the transform falls back to the
    // absolute policy instead of dividing by zero.
    fn degenerate_population_falls_back_to_absolute() {
        let config = RequirementConfig::new(TruncationBounds::default(), RequirementPolicy::Percentile);
        let population = vec![Some(0.8); 6];

        let t = RequirementTransform::fit(&config, &population);

        assert!(t.fell_back);
        assert_eq!(t.scaling, Scaling::Absolute);
        assert_relative_eq!(t.derive(0.8), annualize(0.2), epsilon = 1e-15);
        assert_eq!(t.derive_all(&[None, Some(0.8)])[0], None);
    }

    #[test]
    // Purpose
    // -------
    // Bounds validation and policy names.
    fn bounds_and_policy_parsing() {
        assert!(TruncationBounds::new(0.3, 0.1).is_err());
        assert!(TruncationBounds::new(-0.1, 0.1).is_err());
        assert!(TruncationBounds::new(0.0, f64::INFINITY).is_err());
        assert!(TruncationBounds::new(0.2, 0.2).is_ok());
        assert_eq!("Percentilbaserat".parse::<RequirementPolicy>(), Ok(RequirementPolicy::Percentile));
        assert_eq!("absolut".parse::<RequirementPolicy>(), Ok(RequirementPolicy::Absolute));
        assert!("median".parse::<RequirementPolicy>().is_err());
    }
}
