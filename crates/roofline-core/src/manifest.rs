//! Experiment manifest: kernels to measure, desired counters and default
//! run settings.

use crate::event::InstrumentationKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Floating point events tried in order; the first available one is used.
pub const DEFAULT_FP_EVENTS: [&str; 2] = ["PAPI_FP_OPS", "PAPI_DP_OPS"];

/// Named problem-size parameters of one preset (e.g. `N = 1000`).
pub type Parameters = BTreeMap<String, f64>;

/// Project-level manifest describing an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentManifest {
    pub name: String,
    #[serde(default)]
    pub kernels: Vec<KernelSpec>,
    #[serde(default = "default_fp_events")]
    pub fp_events: Vec<String>,
    #[serde(default)]
    pub cache_events: Vec<String>,
    #[serde(default)]
    pub defaults: RunConfig,
}

fn default_fp_events() -> Vec<String> {
    DEFAULT_FP_EVENTS.iter().map(|e| e.to_string()).collect()
}

impl ExperimentManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernels: Vec::new(),
            fp_events: default_fp_events(),
            cache_events: Vec::new(),
            defaults: RunConfig::default(),
        }
    }

    pub fn with_kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernels.push(kernel);
        self
    }

    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Other(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// How to build, run and analyze one benchmark on one backend.
///
/// Command lines are argument vectors; the first element is the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub benchmark: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Produces the instrumented artifact. Optional for kernels that are
    /// compiled on first run.
    #[serde(default)]
    pub compile: Option<Vec<String>>,
    /// Executes the artifact once and reports timing and counters.
    pub run: Vec<String>,
    /// Static cost-model analysis printing metric values for a preset.
    #[serde(default)]
    pub cost: Option<Vec<String>>,
    /// Directory where the kernel drops instrumentation report files.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default)]
    pub presets: BTreeMap<String, Parameters>,
}

fn default_backend() -> String {
    "command".to_string()
}

impl KernelSpec {
    pub fn new(benchmark: impl Into<String>, run: Vec<String>) -> Self {
        Self {
            benchmark: benchmark.into(),
            backend: default_backend(),
            compile: None,
            run,
            cost: None,
            report_dir: None,
            workdir: None,
            presets: BTreeMap::new(),
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>, parameters: Parameters) -> Self {
        self.presets.insert(preset.into(), parameters);
        self
    }

    /// Parameters of a preset; a preset that is not listed has none.
    pub fn parameters(&self, preset: &str) -> Parameters {
        self.presets.get(preset).cloned().unwrap_or_default()
    }
}

/// Settings of one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub repetitions: usize,
    pub preset: String,
    /// Run one unmeasured invocation before each measured one.
    pub warmup: bool,
    /// Evict CPU caches on all cores with this many MiB per core before
    /// each measured invocation. Replaces the warmup when set.
    pub flush_cache_mb: Option<usize>,
    /// Group cache events into jointly measurable sets instead of
    /// measuring each alone.
    pub build_event_sets: bool,
    pub instrumentation: InstrumentationKind,
    pub store_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repetitions: 10,
            preset: "S".to_string(),
            warmup: true,
            flush_cache_mb: None,
            build_event_sets: true,
            instrumentation: InstrumentationKind::Papi,
            store_dir: PathBuf::from("roofline-results"),
        }
    }
}
