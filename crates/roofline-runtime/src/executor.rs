use crate::cache::flush_cpu_caches;
use crate::collector::collect_trials;
use crate::store::{EventAverageRow, EventCountRow, ResultStore};
use log::{error, info, warn};
use roofline_analysis::aggregate::{aggregate, extremes, finite_mean};
use roofline_backend::{Backend, CommandBackend, CompiledKernel, InputBindings};
use roofline_core::{
    AggregateRecord, Error, EventSet, InstrumentationConfig, KernelRegistry,
    KernelSpec, OptimizationOutcome, Result, RunConfig, RunId, SampleSeries, SubjectId,
};
use std::collections::{BTreeMap, BTreeSet};

/// Metric name used when a subject is measured without counters.
pub const TIME_METRIC: &str = "time";

/// Suffix marking subjects measured with cold caches.
pub const CACHE_FLUSHED_SUFFIX: &str = "_cache_flushed";

/// One measured invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub sample_id: String,
    pub sample_path: String,
    pub time: f64,
    pub totals: BTreeMap<String, f64>,
}

/// Everything measured for one event set of one subject.
#[derive(Debug, Clone)]
pub struct SetMeasurement {
    pub events: EventSet,
    pub optimization: OptimizationOutcome,
    pub trials: Vec<Trial>,
    pub times: SampleSeries,
    /// One series per event, or the timing series when no events were set.
    pub series: Vec<SampleSeries>,
    pub aggregates: Vec<AggregateRecord>,
}

#[derive(Debug, Clone)]
pub struct SubjectMeasurement {
    pub subject: SubjectId,
    pub sets: Vec<SetMeasurement>,
}

impl SubjectMeasurement {
    /// `(series, aggregate)` pairs across all event sets.
    pub fn metrics(&self) -> impl Iterator<Item = (&SampleSeries, &AggregateRecord)> {
        self.sets
            .iter()
            .flat_map(|set| set.series.iter().zip(set.aggregates.iter()))
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub run_id: RunId,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn failed_benchmarks(&self) -> Vec<&str> {
        self.failed.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Runs measurement batches against registered kernels.
pub struct Executor {
    registry: KernelRegistry,
    backends: BTreeMap<&'static str, Box<dyn Backend>>,
    backend: String,
    config: RunConfig,
    run_id: RunId,
}

impl Executor {
    pub fn new(registry: KernelRegistry, config: RunConfig) -> Self {
        let mut backends: BTreeMap<&'static str, Box<dyn Backend>> = BTreeMap::new();
        let command = CommandBackend::new();
        backends.insert(command.name(), Box::new(command));

        Self {
            registry,
            backends,
            backend: "command".to_string(),
            config,
            run_id: RunId::now(),
        }
    }

    /// Register a backend and select it.
    pub fn with_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = backend.name().to_string();
        self.backends.insert(backend.name(), backend);
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn backend(&self) -> Result<&dyn Backend> {
        self.backends
            .get(self.backend.as_str())
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::Other(format!("Unknown backend '{}'", self.backend)))
    }

    /// Identifier rows are stored under for a benchmark.
    pub fn subject_id(&self, benchmark: &str) -> SubjectId {
        if self.config.flush_cache_mb.is_some() {
            SubjectId::new(format!("{}{}", benchmark, CACHE_FLUSHED_SUFFIX))
        } else {
            SubjectId::new(benchmark)
        }
    }

    /// Measure one benchmark: compile once per event set and run the
    /// configured number of repetitions for each.
    ///
    /// With no event sets the kernel is measured once, timer only.
    pub fn measure(&self, benchmark: &str, event_sets: &[EventSet]) -> Result<SubjectMeasurement> {
        let backend = self.backend()?;
        let kernel = self.registry.find(benchmark, backend.name())?;
        let subject = self.subject_id(benchmark);

        let timer_only = [EventSet::new()];
        let sets = if event_sets.is_empty() {
            &timer_only[..]
        } else {
            event_sets
        };

        let mut sample_ids = BTreeSet::new();
        let mut measured = Vec::with_capacity(sets.len());
        for (index, events) in sets.iter().enumerate() {
            let mut set = self.measure_set(backend, kernel, &subject, index, events)?;
            for (trial_index, trial) in set.trials.iter_mut().enumerate() {
                if !sample_ids.insert(trial.sample_id.clone()) {
                    warn!("{}: repeated sample id {}", subject, trial.sample_id);
                    trial.sample_id = self.fallback_sample_id(&subject, index, trial_index);
                    sample_ids.insert(trial.sample_id.clone());
                }
            }
            measured.push(set);
        }

        Ok(SubjectMeasurement {
            subject,
            sets: measured,
        })
    }

    fn measure_set(
        &self,
        backend: &dyn Backend,
        kernel: &KernelSpec,
        subject: &SubjectId,
        set_index: usize,
        events: &EventSet,
    ) -> Result<SetMeasurement> {
        let instrumentation = if events.is_empty() {
            InstrumentationConfig::timer()
        } else {
            InstrumentationConfig {
                kind: self.config.instrumentation,
                events: events.clone(),
            }
        };

        info!("{}: compiling for [{}]", subject, events);
        let compilation = backend.compile(kernel, &instrumentation)?;
        let bindings = kernel.parameters(&self.config.preset);

        let trials = collect_trials(self.config.repetitions, |index| {
            self.trial(compilation.kernel.as_ref(), &bindings, subject, set_index, index)
        })?;

        let mut times = SampleSeries::new(subject.clone(), TIME_METRIC);
        times.extend(trials.iter().map(|t| t.time));
        let mean_time = finite_mean(times.values());

        let series: Vec<SampleSeries> = if events.is_empty() {
            vec![times.clone()]
        } else {
            events
                .iter()
                .map(|event| {
                    let values: Vec<f64> = trials
                        .iter()
                        .map(|t| t.totals.get(event).copied().unwrap_or(f64::NAN))
                        .collect();
                    if values.iter().all(|v| v.is_nan()) {
                        warn!("{}: no counts reported for {}", subject, event);
                    }
                    SampleSeries::from_values(subject.clone(), event, values)
                })
                .collect()
        };

        let aggregates = series
            .iter()
            .map(|s| aggregate(s).with_time(Some(mean_time)))
            .collect();

        Ok(SetMeasurement {
            events: events.clone(),
            optimization: compilation.optimization,
            trials,
            times,
            series,
            aggregates,
        })
    }

    fn trial(
        &self,
        kernel: &dyn CompiledKernel,
        bindings: &InputBindings,
        subject: &SubjectId,
        set_index: usize,
        index: usize,
    ) -> Result<Trial> {
        if let Some(size_mb) = self.config.flush_cache_mb {
            flush_cpu_caches(size_mb)?;
        } else if self.config.warmup {
            kernel.invoke(bindings)?;
        }

        let invocation = kernel.invoke(bindings)?;
        let time = invocation.time.unwrap_or(f64::NAN);

        let fallback_id = || self.fallback_sample_id(subject, set_index, index);
        let trial = match invocation.report {
            Some(report) => Trial {
                sample_id: if report.name.is_empty() {
                    fallback_id()
                } else {
                    report.name.clone()
                },
                sample_path: report
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                time,
                totals: report.event_totals(),
            },
            None => Trial {
                sample_id: fallback_id(),
                sample_path: String::new(),
                time,
                totals: BTreeMap::new(),
            },
        };
        Ok(trial)
    }

    /// `<run>-<subject>-<set>-<trial>`, used when a report carries no usable name.
    fn fallback_sample_id(&self, subject: &SubjectId, set_index: usize, index: usize) -> String {
        format!("{}-{}-{}-{}", self.run_id, subject, set_index, index)
    }

    /// Write a subject's averages and raw counts to the store. Nothing is
    /// written if any row would clash with a stored one.
    pub fn persist(&self, measurement: &SubjectMeasurement, store: &mut ResultStore) -> Result<()> {
        let preset = self.config.preset.as_str();
        let mut averages = Vec::new();
        let mut counts = Vec::new();

        for set in &measurement.sets {
            averages.extend(set.aggregates.iter().map(|record| {
                EventAverageRow::from_record(self.run_id, self.config.repetitions, preset, record)
            }));

            for trial in &set.trials {
                for series in &set.series {
                    let raw_value = if series.metric == TIME_METRIC && set.events.is_empty() {
                        trial.time
                    } else {
                        trial.totals.get(&series.metric).copied().unwrap_or(f64::NAN)
                    };
                    counts.push(EventCountRow {
                        sample_id: trial.sample_id.clone(),
                        sample_path: trial.sample_path.clone(),
                        run_id: self.run_id,
                        subject: measurement.subject.clone(),
                        preset: preset.to_string(),
                        metric: series.metric.clone(),
                        raw_value,
                        time: Some(trial.time),
                    });
                }
            }
        }

        store.insert_batch(&averages, &counts)
    }

    /// Measure and persist every benchmark. A failing benchmark is logged
    /// and recorded as failed; the batch always continues.
    ///
    /// `on_subject` sees each benchmark's result as soon as it is known.
    pub fn run_batch<F>(
        &self,
        benchmarks: &[String],
        event_sets: &[EventSet],
        store: &mut ResultStore,
        mut on_subject: F,
    ) -> BatchOutcome
    where
        F: FnMut(&str, &Result<SubjectMeasurement>),
    {
        let mut outcome = BatchOutcome::new(self.run_id);

        for benchmark in benchmarks {
            let result = self
                .measure(benchmark, event_sets)
                .and_then(|m| self.persist(&m, store).map(|_| m));

            on_subject(benchmark, &result);

            match result {
                Ok(_) => outcome.succeeded.push(benchmark.clone()),
                Err(e) => {
                    error!("{}: {}", benchmark, e);
                    outcome.failed.push((benchmark.clone(), e.to_string()));
                }
            }
        }

        outcome
    }
}

/// `METRIC | Max | Min | Avg | Var | StdDev | StdDev%` for one series.
pub fn summary_line(series: &SampleSeries, record: &AggregateRecord) -> String {
    let (max, min) = extremes(series.values()).unwrap_or((f64::NAN, f64::NAN));
    format!(
        "{} | {} | {} | {} | {} | {} | {:.2}",
        record.metric, max, min, record.mean, record.variance, record.stddev, record.stddev_pct
    )
}
