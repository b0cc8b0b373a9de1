//! What external collaborators report back: per-invocation counter reports
//! and the outcome of optional optimization steps.

use crate::nan::Float;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `thread id → raw values` for one event of one instrumented element.
pub type ThreadCounts = BTreeMap<String, Vec<f64>>;

type Counters = BTreeMap<String, BTreeMap<String, ThreadCounts>>;

/// Counter report of one kernel invocation.
///
/// Counters are nested as `element → event → thread → values`, mirroring
/// how instrumented programs dump them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentationReport {
    /// Report name; instrumented programs use a timestamp, so names sort
    /// chronologically.
    #[serde(default)]
    pub name: String,
    /// File the report was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Non-finite counts are written as `null` and read back as NaN.
    #[serde(default, deserialize_with = "deserialize_counters")]
    pub counters: Counters,
}

fn deserialize_counters<'de, D>(deserializer: D) -> std::result::Result<Counters, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, BTreeMap<String, BTreeMap<String, Vec<Float>>>>::deserialize(
        deserializer,
    )?;
    Ok(raw
        .into_iter()
        .map(|(element, events)| {
            let events = events
                .into_iter()
                .map(|(event, threads)| {
                    let threads = threads
                        .into_iter()
                        .map(|(thread, values)| (thread, values.into_iter().map(|v| v.0).collect()))
                        .collect();
                    (event, threads)
                })
                .collect();
            (element, events)
        })
        .collect())
}

impl InstrumentationReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            counters: BTreeMap::new(),
        }
    }

    /// Record the values one thread observed for an event of an element.
    pub fn record(
        &mut self,
        element: impl Into<String>,
        event: impl Into<String>,
        thread: impl Into<String>,
        values: Vec<f64>,
    ) {
        self.counters
            .entry(element.into())
            .or_default()
            .entry(event.into())
            .or_default()
            .insert(thread.into(), values);
    }

    /// Total count of every event for this invocation: the sum over all
    /// elements and threads of each thread's first value.
    pub fn event_totals(&self) -> BTreeMap<String, f64> {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for events in self.counters.values() {
            for (event, threads) in events {
                let sum: f64 = threads
                    .values()
                    .filter_map(|values| values.first().copied())
                    .sum();
                *totals.entry(event.clone()).or_insert(0.0) += sum;
            }
        }
        totals
    }

    /// Load a report from a JSON file. A missing name defaults to the file
    /// stem.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Collaborator(format!("Failed to read report {}: {}", path.display(), e))
        })?;
        let mut report: InstrumentationReport = serde_json::from_str(&content)?;
        if report.name.is_empty() {
            report.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        report.path = Some(path.to_path_buf());
        Ok(report)
    }
}

/// Result of an optional optimization step.
///
/// Callers can tell "optimized" from "optimization unavailable, continuing
/// unoptimized" without the failure being swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OptimizationOutcome {
    Applied,
    Skipped { reason: String },
    /// The collaborator did not say.
    #[default]
    Unknown,
}

impl OptimizationOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        OptimizationOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_totals_sum_threads_and_elements() {
        let mut report = InstrumentationReport::new("1700000000000");
        report.record("map_0", "PAPI_L1_DCM", "0", vec![10.0, 99.0]);
        report.record("map_0", "PAPI_L1_DCM", "1", vec![5.0]);
        report.record("map_1", "PAPI_L1_DCM", "0", vec![1.0]);
        report.record("map_1", "PAPI_DP_OPS", "0", vec![]);

        let totals = report.event_totals();
        assert_eq!(totals["PAPI_L1_DCM"], 16.0);
        assert_eq!(totals["PAPI_DP_OPS"], 0.0);
    }

    #[test]
    fn test_load_defaults_name_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1712345678.json");
        fs::write(&path, r#"{"counters":{"s0":{"PAPI_L2_TCM":{"0":[7]}}}}"#).unwrap();

        let report = InstrumentationReport::load(&path).unwrap();
        assert_eq!(report.name, "1712345678");
        assert_eq!(report.path.as_deref(), Some(path.as_path()));
        assert_eq!(report.event_totals()["PAPI_L2_TCM"], 7.0);
    }

    #[test]
    fn test_non_finite_counts_survive_json() {
        let mut report = InstrumentationReport::new("1700000000001");
        report.record("map_0", "PAPI_L3_TCM", "0", vec![f64::NAN]);
        report.record("map_0", "PAPI_L3_TCM", "1", vec![4.0]);

        let json = serde_json::to_string(&report).unwrap();
        let back: InstrumentationReport = serde_json::from_str(&json).unwrap();

        assert!(back.counters["map_0"]["PAPI_L3_TCM"]["0"][0].is_nan());
        assert_eq!(back.counters["map_0"]["PAPI_L3_TCM"]["1"], vec![4.0]);
    }

    #[test]
    fn test_optimization_outcome_json() {
        let json = serde_json::to_string(&OptimizationOutcome::skipped("no CPU map")).unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"no CPU map"}"#);
    }
}
