//! Descriptive statistics of a sample series.

use roofline_core::record::UNDEFINED_RELATIVE_STDDEV;
use roofline_core::{AggregateRecord, SampleSeries};

/// Reduce a series to its summary statistics.
///
/// Non-finite observations are dropped first. An empty remainder yields
/// NaN statistics with `count == 0`.
pub fn aggregate(series: &SampleSeries) -> AggregateRecord {
    let values = series.finite_values();

    let mean = mean(&values);
    let variance = population_variance(&values);
    let stddev = variance.sqrt();

    AggregateRecord {
        subject: series.subject.clone(),
        metric: series.metric.clone(),
        count: values.len(),
        mean,
        median: median(&values),
        variance,
        stddev,
        stddev_pct: relative_stddev(stddev, mean),
        time: None,
    }
}

/// Arithmetic mean, NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the finite values only.
pub fn finite_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    mean(&finite)
}

/// Median; even-length slices average the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Mean squared deviation from the mean (divisor = count).
pub fn population_variance(values: &[f64]) -> f64 {
    let mean = mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// `stddev / mean * 100`, or the sentinel when the mean is not positive.
pub fn relative_stddev(stddev: f64, mean: f64) -> f64 {
    if mean > 0.0 {
        stddev / mean * 100.0
    } else {
        UNDEFINED_RELATIVE_STDDEV
    }
}

/// Largest and smallest finite value.
pub fn extremes(values: &[f64]) -> Option<(f64, f64)> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;
    Some(finite.fold((first, first), |(max, min), v| (max.max(v), min.min(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn series(values: &[f64]) -> SampleSeries {
        SampleSeries::from_values("gemm", "PAPI_L2_TCM", values.to_vec())
    }

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_five_sample_summary() {
        let record = aggregate(&series(&[10.0, 12.0, 11.0, 13.0, 10.0]));

        assert_eq!(record.count, 5);
        assert!(approx(record.mean, 11.2, 1e-12));
        assert_eq!(record.median, 11.0);
        assert!(approx(record.variance, 1.36, 1e-12));
        assert!(approx(record.stddev, 1.1662, 1e-4));
        assert!(approx(record.stddev_pct, 10.41, 1e-2));
    }

    #[test]
    fn test_mean_is_sum_over_len() {
        let values = [3.5, 7.25, 1.0, 100.0];
        let record = aggregate(&series(&values));
        assert_eq!(record.mean, values.iter().sum::<f64>() / 4.0);
        assert!(record.variance >= 0.0);
    }

    #[test]
    fn test_constant_series_has_zero_variance() {
        let record = aggregate(&series(&[42.0; 7]));
        assert_eq!(record.variance, 0.0);
        assert_eq!(record.stddev, 0.0);
        assert_eq!(record.stddev_pct, 0.0);
    }

    #[test]
    fn test_single_sample() {
        let record = aggregate(&series(&[5.0]));
        assert_eq!(record.count, 1);
        assert_eq!(record.median, 5.0);
        assert_eq!(record.variance, 0.0);
        assert_eq!(record.stddev_pct, 0.0);

        let zero = aggregate(&series(&[0.0]));
        assert_eq!(zero.stddev_pct, UNDEFINED_RELATIVE_STDDEV);
        assert!(!zero.has_relative_stddev());
    }

    #[test]
    fn test_even_length_median_averages_middle_values() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_non_positive_mean_uses_sentinel() {
        let record = aggregate(&series(&[-1.0, -3.0]));
        assert_eq!(record.stddev_pct, UNDEFINED_RELATIVE_STDDEV);
    }

    #[test]
    fn test_non_finite_values_are_excluded() {
        let record = aggregate(&series(&[1.0, f64::NAN, 3.0, f64::INFINITY]));
        assert_eq!(record.count, 2);
        assert_eq!(record.mean, 2.0);
        assert_eq!(record.variance, 1.0);
    }

    #[test]
    fn test_all_non_finite_yields_nan() {
        let record = aggregate(&series(&[f64::NAN, f64::NEG_INFINITY]));
        assert_eq!(record.count, 0);
        assert!(record.mean.is_nan());
        assert!(record.median.is_nan());
        assert!(record.variance.is_nan());
        assert_eq!(record.stddev_pct, UNDEFINED_RELATIVE_STDDEV);
    }

    #[test]
    fn test_permutation_invariance() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut values: Vec<f64> = (0..31).map(|i| ((i * 37) % 11) as f64 + 0.5).collect();
        let reference = aggregate(&series(&values));

        for _ in 0..10 {
            values.shuffle(&mut rng);
            let shuffled = aggregate(&series(&values));
            assert!(approx(shuffled.mean, reference.mean, 1e-9));
            assert_eq!(shuffled.median, reference.median);
            assert!(approx(shuffled.variance, reference.variance, 1e-9));
            assert!(approx(shuffled.stddev, reference.stddev, 1e-9));
        }
    }

    #[test]
    fn test_extremes() {
        assert_eq!(extremes(&[3.0, f64::NAN, -1.0, 7.0]), Some((7.0, -1.0)));
        assert_eq!(extremes(&[f64::NAN]), None);
    }
}
