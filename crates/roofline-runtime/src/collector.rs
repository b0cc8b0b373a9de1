//! Repeated sampling of side-effecting trials.

use log::debug;
use roofline_core::{Result, SampleSeries, SubjectId};

/// Something a single trial can produce and append to a series.
pub trait TrialValue {
    fn append_to(self, series: &mut SampleSeries);
}

impl TrialValue for f64 {
    fn append_to(self, series: &mut SampleSeries) {
        series.push(self);
    }
}

impl TrialValue for Vec<f64> {
    fn append_to(self, series: &mut SampleSeries) {
        series.extend(self);
    }
}

/// Run `trial` exactly `repetitions` times and return the results in call
/// order. The first failing trial aborts the collection.
pub fn collect_trials<T, F>(repetitions: usize, mut trial: F) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Result<T>,
{
    let mut results = Vec::with_capacity(repetitions);
    for index in 0..repetitions {
        results.push(trial(index)?);
    }
    Ok(results)
}

/// Collect a sample series for one (subject, metric) pair.
///
/// Nothing is cached between calls: every trial is a fresh measurement.
pub fn collect<T, F>(
    subject: impl Into<SubjectId>,
    metric: impl Into<String>,
    repetitions: usize,
    trial: F,
) -> Result<SampleSeries>
where
    T: TrialValue,
    F: FnMut(usize) -> Result<T>,
{
    let mut series = SampleSeries::new(subject, metric);
    for value in collect_trials(repetitions, trial)? {
        value.append_to(&mut series);
    }
    debug!(
        "{}/{}: {} samples",
        series.subject,
        series.metric,
        series.len()
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roofline_core::Error;

    #[test]
    fn test_calls_trial_exactly_repetitions_times() {
        let mut calls = Vec::new();
        let series = collect("gemm", "time", 4, |i| {
            calls.push(i);
            Ok(i as f64 * 1.5)
        })
        .unwrap();

        assert_eq!(calls, vec![0, 1, 2, 3]);
        assert_eq!(series.values(), &[0.0, 1.5, 3.0, 4.5]);
        assert_eq!(series.subject.as_str(), "gemm");
    }

    #[test]
    fn test_list_valued_trials_are_flattened_in_order() {
        let series = collect("gemm", "PAPI_L1_DCM", 2, |i| Ok(vec![i as f64, 10.0 + i as f64])).unwrap();
        assert_eq!(series.values(), &[0.0, 10.0, 1.0, 11.0]);
    }

    #[test]
    fn test_failure_aborts_collection() {
        let mut calls = 0;
        let result = collect("lu", "time", 5, |i| {
            calls += 1;
            if i == 2 {
                Err(Error::Collaborator("kernel crashed".into()))
            } else {
                Ok(1.0)
            }
        });

        assert!(matches!(result, Err(Error::Collaborator(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_finite_values_are_kept_raw() {
        let series = collect("lu", "time", 2, |i| Ok(if i == 0 { f64::NAN } else { 2.0 })).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.finite_values(), vec![2.0]);
    }
}
