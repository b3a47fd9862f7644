//! Small descriptive-statistics helpers shared across layers.
//!
//! Percentiles use linear interpolation between order statistics
//! (position `q/100 · (n − 1)`), the convention of the regulator's
//! spreadsheets and of numpy's default. Callers filter non-finite values
//! first.

/// `q`-th percentile (`0 ≤ q ≤ 100`) of `values`, or `None` when empty.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, q))
}

/// Same as [`percentile`] on an already ascending, non-empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Finite entries of an optional-score vector.
pub fn finite_values(scores: &[Option<f64>]) -> Vec<f64> {
    scores.iter().filter_map(|s| s.filter(|v| v.is_finite())).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Second and third central moments `(m2, m3)` with divisor `n`.
pub fn central_moments(values: &[f64]) -> Option<(f64, f64)> {
    let mu = mean(values)?;
    let n = values.len() as f64;
    let (m2, m3) = values.iter().fold((0.0, 0.0), |(m2, m3), v| {
        let d = v - mu;
        (m2 + d * d, m3 + d * d * d)
    });
    Some((m2 / n, m3 / n))
}

/// Pearson correlation. `None` for fewer than two pairs or zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (ma, mb) = (mean(a)?, mean(b)?);
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom > 0.0 { Some(sab / denom) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Linear-interpolation percentiles on a small sample.
    //
    // Given
    // -----
    // - {4, 1, 3, 2}: sorted {1, 2, 3, 4}.
    //
    // Expect
    // ------
    // - Q1 = 1.75, median = 2.5, Q3 = 3.25, p0 = 1, p100 = 4.
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];

        assert_relative_eq!(percentile(&v, 25.0).unwrap(), 1.75);
        assert_relative_eq!(percentile(&v, 50.0).unwrap(), 2.5);
        assert_relative_eq!(percentile(&v, 75.0).unwrap(), 3.25);
        assert_relative_eq!(percentile(&v, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile(&v, 100.0).unwrap(), 4.0);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    // Purpose
    // -------
    // Pearson correlation of perfectly (anti-)linear data is ±1; constant
    // data has no correlation.
    fn pearson_handles_linear_and_constant_inputs() {
        let a = [1.0, 2.0, 3.0];

        assert_relative_eq!(pearson(&a, &[2.0, 4.0, 6.0]).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&a, &[3.0, 2.0, 1.0]).unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(pearson(&a, &[5.0, 5.0, 5.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    // Purpose
    // -------
    // Central moments of a skewed sample.
    fn central_moments_of_skewed_sample() {
        // {0, 0, 3}: mean 1, deviations {-1, -1, 2}.
        let (m2, m3) = central_moments(&[0.0, 0.0, 3.0]).unwrap();

        assert_relative_eq!(m2, 2.0);
        assert_relative_eq!(m3, 2.0);
        assert_eq!(finite_values(&[Some(1.0), None, Some(f64::NAN)]), vec![1.0]);
    }
}
