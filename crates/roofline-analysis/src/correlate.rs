//! Correlation between a static predictor and a measured metric.
//!
//! Both inputs map subjects to values. Only subjects where both values are
//! finite take part; missing subjects are skipped, not an error. With fewer
//! than two points, or a constant side, every coefficient is NaN.

use crate::aggregate::finite_mean;
use roofline_core::{CorrelationOverview, CorrelationRecord, SubjectId};
use std::collections::BTreeMap;

/// Values of one metric keyed by subject.
pub type SubjectValues = BTreeMap<SubjectId, f64>;

/// Compute all coefficients for one (predictor, measured) pair.
pub fn correlate(
    predictor_name: &str,
    measured_name: &str,
    predictor: &SubjectValues,
    measured: &SubjectValues,
) -> CorrelationRecord {
    let (x, y) = join(predictor, measured);

    let mut record = CorrelationRecord {
        predictor: predictor_name.to_string(),
        measured: measured_name.to_string(),
        points: x.len(),
        pearson: f64::NAN,
        spearman: f64::NAN,
        kendall: f64::NAN,
        pearson_loglog: f64::NAN,
    };

    if x.len() < 2 || is_constant(&x) || is_constant(&y) {
        return record;
    }

    record.pearson = pearson(&x, &y);
    record.spearman = spearman(&x, &y);
    record.kendall = kendall(&x, &y);

    let (lx, ly) = join(&log_transform(predictor), &log_transform(measured));
    record.pearson_loglog = pearson(&lx, &ly);

    record
}

/// Mean of each coefficient per predictor, ignoring undefined values.
///
/// Predictors come out sorted by name.
pub fn correlation_overview(records: &[CorrelationRecord]) -> Vec<CorrelationOverview> {
    let mut groups: BTreeMap<&str, Vec<&CorrelationRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.predictor.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(predictor, group)| {
            let column = |f: fn(&CorrelationRecord) -> f64| {
                finite_mean(&group.iter().map(|r| f(r)).collect::<Vec<_>>())
            };
            CorrelationOverview {
                predictor: predictor.to_string(),
                pairs: group.len(),
                pearson: column(|r| r.pearson),
                spearman: column(|r| r.spearman),
                kendall: column(|r| r.kendall),
                pearson_loglog: column(|r| r.pearson_loglog),
            }
        })
        .collect()
}

/// Paired values for subjects present and finite on both sides, in subject
/// order.
pub fn join(left: &SubjectValues, right: &SubjectValues) -> (Vec<f64>, Vec<f64>) {
    left.iter()
        .filter_map(|(subject, x)| right.get(subject).map(|y| (*x, *y)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .unzip()
}

/// `log10(v)` for positive values, NaN otherwise.
pub fn log10_positive(value: f64) -> f64 {
    if value > 0.0 {
        value.log10()
    } else {
        f64::NAN
    }
}

fn log_transform(values: &SubjectValues) -> SubjectValues {
    values
        .iter()
        .map(|(subject, v)| (subject.clone(), log10_positive(*v)))
        .collect()
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Pearson linear correlation coefficient.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// 1-based ranks; tied values share the average of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // positions i+1..=j
        let rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        i = j;
    }
    ranks
}

/// Spearman rank correlation: Pearson on average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Kendall rank correlation, tau-b variant.
pub fn kendall(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }

    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut tied_x = 0i64;
    let mut tied_y = 0i64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 {
                tied_x += 1;
            }
            if dy == 0.0 {
                tied_y += 1;
            }
            if dx == 0.0 || dy == 0.0 {
                continue;
            }
            if (dx > 0.0) == (dy > 0.0) {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    let pairs = (n * (n - 1) / 2) as i64;
    let denominator = (((pairs - tied_x) * (pairs - tied_y)) as f64).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    (concordant - discordant) as f64 / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn values(pairs: &[(&str, f64)]) -> SubjectValues {
        pairs.iter().map(|(s, v)| (SubjectId::from(*s), *v)).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_series() {
        let x = values(&[("a", 1.0), ("b", 2.0), ("c", 4.0), ("d", 8.0)]);
        let record = correlate("Symbolic Bytes", "PAPI_L2_TCM", &x, &x);

        assert_eq!(record.points, 4);
        assert!(approx(record.pearson, 1.0));
        assert!(approx(record.spearman, 1.0));
        assert!(approx(record.kendall, 1.0));
        assert!(approx(record.pearson_loglog, 1.0));
    }

    #[test]
    fn test_constant_predictor_is_undefined() {
        let x = values(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let y = values(&[("a", 3.0), ("b", 5.0), ("c", 4.0)]);
        let record = correlate("work", "time", &x, &y);

        assert!(record.pearson.is_nan());
        assert!(record.is_undefined());
    }

    #[test]
    fn test_single_point_is_undefined() {
        let x = values(&[("a", 1.0), ("b", 2.0)]);
        let y = values(&[("a", 3.0), ("z", 5.0)]);
        let record = correlate("work", "time", &x, &y);

        assert_eq!(record.points, 1);
        assert!(record.is_undefined());
    }

    #[test]
    fn test_join_skips_missing_and_non_finite() {
        let x = values(&[("a", 1.0), ("b", f64::NAN), ("c", 3.0), ("d", 4.0)]);
        let y = values(&[("a", 2.0), ("b", 2.0), ("c", 6.0)]);
        let (jx, jy) = join(&x, &y);
        assert_eq!(jx, vec![1.0, 3.0]);
        assert_eq!(jy, vec![2.0, 6.0]);
    }

    #[test]
    fn test_anti_correlated() {
        let x = values(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let y = values(&[("a", 30.0), ("b", 20.0), ("c", 10.0)]);
        let record = correlate("p", "m", &x, &y);

        assert!(approx(record.pearson, -1.0));
        assert!(approx(record.spearman, -1.0));
        assert!(approx(record.kendall, -1.0));
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 10.0, 30.0]), vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_is_monotone_invariant() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v: &f64| v.powi(3)).collect();
        assert!(approx(spearman(&x, &y), 1.0));
        assert!(pearson(&x, &y) < 1.0);
    }

    #[test]
    fn test_kendall_tau_b_with_ties() {
        // x ties on (0,1); y ties on (2,3)
        let x = [1.0, 1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 3.0];
        // pairs: 6; concordant 4, discordant 0, tied_x 1, tied_y 1
        let expected = 4.0 / (5.0f64 * 5.0).sqrt();
        assert!(approx(kendall(&x, &y), expected));
    }

    #[test]
    fn test_loglog_excludes_non_positive() {
        let x = values(&[("a", 0.0), ("b", 10.0), ("c", 100.0), ("d", 1000.0)]);
        let y = values(&[("a", 5.0), ("b", 20.0), ("c", 200.0), ("d", 2000.0)]);
        let record = correlate("p", "m", &x, &y);

        // "a" drops out of the log-log join, the rest is exactly linear in log space
        assert_eq!(record.points, 4);
        assert!(approx(record.pearson_loglog, 1.0));
        assert!(log10_positive(0.0).is_nan());
        assert!(log10_positive(-3.0).is_nan());
    }

    #[test]
    fn test_overview_means_skip_nan() {
        let record = |predictor: &str, pearson: f64| CorrelationRecord {
            predictor: predictor.into(),
            measured: "m".into(),
            points: 3,
            pearson,
            spearman: pearson,
            kendall: f64::NAN,
            pearson_loglog: pearson,
        };
        let records = vec![
            record("work", 0.5),
            record("bytes", 0.9),
            record("work", f64::NAN),
            record("work", 1.0),
        ];

        let overview = correlation_overview(&records);
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].predictor, "bytes");
        assert_eq!(overview[1].predictor, "work");
        assert_eq!(overview[1].pairs, 3);
        assert!(approx(overview[1].pearson, 0.75));
        assert!(overview[1].kendall.is_nan());
    }

    #[test]
    fn test_symmetric_under_joint_permutation() {
        let x = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0];
        let y = [2.7, 1.8, 2.8, 1.8, 2.9, 4.5, 0.2, 3.3];
        let reference = (pearson(&x, &y), spearman(&x, &y), kendall(&x, &y));

        let mut rng = StdRng::seed_from_u64(42);
        let mut order: Vec<usize> = (0..x.len()).collect();
        for _ in 0..10 {
            order.shuffle(&mut rng);
            let px: Vec<f64> = order.iter().map(|&i| x[i]).collect();
            let py: Vec<f64> = order.iter().map(|&i| y[i]).collect();
            assert!(approx(pearson(&px, &py), reference.0));
            assert!(approx(spearman(&px, &py), reference.1));
            assert!(approx(kendall(&px, &py), reference.2));
        }
    }
}
