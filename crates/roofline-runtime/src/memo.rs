//! Memoized cost-model results.
//!
//! Stored as pretty-printed JSON: `benchmark → preset → metric → value`.

use log::debug;
use roofline_analysis::MetricTable;
use roofline_core::nan::Float;
use roofline_core::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type CostValues = BTreeMap<String, f64>;

type Entries = BTreeMap<String, BTreeMap<String, CostValues>>;

/// Cost-model values keyed by (benchmark, preset), backed by a JSON file.
#[derive(Debug, Clone)]
pub struct CostCache {
    path: PathBuf,
    entries: Entries,
    dirty: bool,
}

impl CostCache {
    /// Load the cache; a missing file is an empty cache. Values saved as
    /// `null` come back as NaN.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw: BTreeMap<String, BTreeMap<String, BTreeMap<String, Float>>> =
                serde_json::from_str(&fs::read_to_string(&path)?)?;
            raw.into_iter()
                .map(|(benchmark, presets)| {
                    let presets = presets
                        .into_iter()
                        .map(|(preset, values)| {
                            (preset, values.into_iter().map(|(k, v)| (k, v.0)).collect())
                        })
                        .collect();
                    (benchmark, presets)
                })
                .collect()
        } else {
            Entries::new()
        };

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, benchmark: &str, preset: &str) -> Option<&CostValues> {
        self.entries.get(benchmark)?.get(preset)
    }

    pub fn insert(&mut self, benchmark: &str, preset: &str, values: CostValues) {
        self.entries
            .entry(benchmark.to_string())
            .or_default()
            .insert(preset.to_string(), values);
        self.dirty = true;
    }

    /// Cached values, or the result of `compute` which is then cached.
    pub fn get_or_compute<F>(&mut self, benchmark: &str, preset: &str, compute: F) -> Result<&CostValues>
    where
        F: FnOnce() -> Result<CostValues>,
    {
        if self.get(benchmark, preset).is_none() {
            let values = compute()?;
            self.insert(benchmark, preset, values);
        } else {
            debug!("{} ({}): cost values cached", benchmark, preset);
        }

        // present: found above or just inserted
        self.entries
            .get(benchmark)
            .and_then(|presets| presets.get(preset))
            .ok_or_else(|| Error::Other(format!("{}: cache entry vanished", benchmark)))
    }

    /// Write the cache back if it changed since loading.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        Ok(())
    }

    /// Subject × metric table of every benchmark cached for `preset`.
    pub fn metric_table(&self, preset: &str) -> MetricTable {
        MetricTable::from_rows(self.entries.iter().flat_map(|(benchmark, presets)| {
            presets
                .get(preset)
                .into_iter()
                .flat_map(move |values| {
                    values
                        .iter()
                        .map(move |(metric, value)| (benchmark.as_str(), metric.as_str(), *value))
                })
        }))
    }
}
