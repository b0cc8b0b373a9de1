//! Fit quality of a predictor taken at face value.
//!
//! The hypothesis is `measured ≈ predictor` with no calibration, so the
//! residual is simply `measured - predictor`.

use crate::aggregate::{finite_mean, mean};
use crate::correlate::{join, SubjectValues};
use roofline_core::{FitOverview, FitRecord};
use std::collections::BTreeMap;

/// Evaluate RMSE, RMAE and R² over subjects with both values finite.
///
/// Returns `None` when fewer than two subjects remain.
pub fn evaluate_fit(
    predictor_name: &str,
    measured_name: &str,
    predictor: &SubjectValues,
    measured: &SubjectValues,
) -> Option<FitRecord> {
    let (s, m) = join(predictor, measured);
    if s.len() < 2 {
        return None;
    }

    let squared: Vec<f64> = s.iter().zip(&m).map(|(s, m)| (m - s).powi(2)).collect();

    // relative error is undefined where the measurement is zero
    let relative: Vec<f64> = s
        .iter()
        .zip(&m)
        .map(|(s, m)| if *m == 0.0 { f64::NAN } else { (m - s).abs() / m })
        .collect();

    let ss_res: f64 = squared.iter().sum();
    let measured_mean = mean(&m);
    let ss_tot: f64 = m.iter().map(|v| (v - measured_mean).powi(2)).sum();

    Some(FitRecord {
        predictor: predictor_name.to_string(),
        measured: measured_name.to_string(),
        points: s.len(),
        rmse: mean(&squared).sqrt(),
        rmae: finite_mean(&relative),
        r2: if ss_tot == 0.0 {
            f64::NAN
        } else {
            1.0 - ss_res / ss_tot
        },
    })
}

/// Mean RMSE, RMAE and R² per predictor, ignoring undefined values.
///
/// Predictors come out sorted by name.
pub fn fit_overview(records: &[FitRecord]) -> Vec<FitOverview> {
    let mut groups: BTreeMap<&str, Vec<&FitRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.predictor.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(predictor, group)| {
            let column = |f: fn(&FitRecord) -> f64| {
                finite_mean(&group.iter().map(|r| f(r)).collect::<Vec<_>>())
            };
            FitOverview {
                predictor: predictor.to_string(),
                pairs: group.len(),
                rmse: column(|r| r.rmse),
                rmae: column(|r| r.rmae),
                r2: column(|r| r.r2),
            }
        })
        .collect()
}
