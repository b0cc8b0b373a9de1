//! Command implementations for the roofline CLI.

use crate::{AnalyzeArgs, RunArgs};
use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use roofline_analysis::{Analyzer, Machine, MetricTable, Report};
use roofline_backend::{Backend, CommandBackend, CommandCostModel, CostModel, PapiTools};
use roofline_core::{
    EventSet, ExperimentManifest, InstrumentationKind, KernelRegistry, OptimizationOutcome,
    RunConfig, RunId,
};
use roofline_runtime::executor::TIME_METRIC;
use roofline_runtime::{plan_event_sets, summary_line, CostCache, Executor, ResultStore};
use std::path::Path;

/// Backend every manifest kernel is registered for unless it names another.
fn default_backend() -> &'static str {
    CommandBackend::new().name()
}

fn load_manifest(path: &Path) -> Result<ExperimentManifest> {
    ExperimentManifest::load(path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))
}

fn load_registry(manifest: &ExperimentManifest) -> Result<KernelRegistry> {
    KernelRegistry::from_manifest(manifest).context("Invalid kernel list in manifest")
}

/// Requested benchmarks, or every registered one.
fn selected(registry: &KernelRegistry, benchmarks: &[String]) -> Vec<String> {
    if benchmarks.is_empty() {
        registry.benchmarks(default_backend())
    } else {
        benchmarks.to_vec()
    }
}

/// Manifest defaults with command-line overrides applied.
fn run_config(manifest: &ExperimentManifest, args: &RunArgs) -> RunConfig {
    let mut config = manifest.defaults.clone();
    if let Some(repetitions) = args.repetitions {
        config.repetitions = repetitions;
    }
    if let Some(preset) = &args.preset {
        config.preset = preset.clone();
    }
    if args.no_warmup {
        config.warmup = false;
    }
    if args.flush_cache_mb.is_some() {
        config.flush_cache_mb = args.flush_cache_mb;
    }
    if args.no_event_sets {
        config.build_event_sets = false;
    }
    if let Some(instrumentation) = args.instrumentation {
        config.instrumentation = instrumentation.into();
    }
    if let Some(dir) = &args.store_dir {
        config.store_dir = dir.clone();
    }
    config
}

/// Event sets to measure under the given instrumentation.
///
/// PAPI availability and compatibility come from the PAPI tools. LIKWID
/// events are taken as listed and measured one per set.
fn event_sets(
    manifest: &ExperimentManifest,
    kind: InstrumentationKind,
    build_sets: bool,
) -> Result<Vec<EventSet>> {
    let tools = PapiTools::new();
    let mut oracle = tools.event_chooser();

    match kind {
        InstrumentationKind::Timer => Ok(Vec::new()),
        InstrumentationKind::Papi => {
            let available = tools
                .available_presets()
                .context("Failed to list available PAPI events")?;
            plan_event_sets(
                &available,
                &manifest.fp_events,
                &manifest.cache_events,
                build_sets,
                &mut oracle,
            )
            .context("Failed to plan event sets")
        }
        InstrumentationKind::Likwid => {
            let listed: Vec<String> = manifest
                .fp_events
                .iter()
                .chain(manifest.cache_events.iter())
                .cloned()
                .collect();
            plan_event_sets(
                &listed,
                &manifest.fp_events,
                &manifest.cache_events,
                false,
                &mut oracle,
            )
            .context("Failed to plan event sets")
        }
    }
}

/// Collect command: measure benchmarks and persist the results.
pub fn collect(manifest_path: &Path, benchmarks: &[String], args: &RunArgs) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let registry = load_registry(&manifest)?;
    let config = run_config(&manifest, args);
    let benchmarks = selected(&registry, benchmarks);

    if benchmarks.is_empty() {
        println!("No kernels registered in {}", manifest_path.display());
        return Ok(());
    }

    let sets = event_sets(&manifest, config.instrumentation, config.build_event_sets)?;
    let mut store = ResultStore::open(&config.store_dir)
        .with_context(|| format!("Failed to open result store {}", config.store_dir.display()))?;

    println!(
        "Collecting {} benchmark(s), preset {}, {} repetition(s), {} event set(s)",
        benchmarks.len(),
        config.preset,
        config.repetitions,
        sets.len()
    );
    if let Some(size_mb) = config.flush_cache_mb {
        println!("  (flushing {} MiB of cache per core before each trial)", size_mb);
    }
    println!();

    let executor = Executor::new(registry, config);
    let outcome = executor.run_batch(&benchmarks, &sets, &mut store, |name, result| {
        println!("===== {} =====", name);
        match result {
            Ok(measurement) => {
                for set in &measurement.sets {
                    if let OptimizationOutcome::Skipped { reason } = &set.optimization {
                        println!("  optimization skipped [{}]: {}", set.events, reason);
                    }
                }
                for (series, record) in measurement.metrics() {
                    println!("{}", summary_line(series, record));
                }
            }
            Err(e) => println!("FAILED: {}", e),
        }
        println!();
    });

    println!("Run {}", outcome.run_id);
    println!("  Succeeded: {}", outcome.succeeded.len());
    println!("  Failed: {}", outcome.failed.len());
    for (name, reason) in &outcome.failed {
        println!("    {}: {}", name, reason);
    }
    println!(
        "  Duration: {:.2} minutes",
        outcome.run_id.elapsed_minutes(RunId::now())
    );
    println!("  Store: {}", store.dir().display());

    Ok(())
}

/// Events command: show what the PAPI tools report and the sets a
/// collection would measure.
pub fn events(manifest_path: &Path, build_sets: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let tools = PapiTools::new();

    let available = tools
        .available_presets()
        .context("Failed to list available PAPI events")?;
    println!("Available preset events: {}", available.len());
    for event in &available {
        println!("  {}", event);
    }
    println!();

    match tools.native_events() {
        Ok(native) => {
            println!("Native events: {}", native.len());
            for (name, modifiers) in &native {
                println!("  {} ({} modifiers)", name, modifiers.len());
            }
        }
        Err(e) => warn!("native events unavailable: {}", e),
    }
    println!();

    let unavailable: Vec<&str> = manifest
        .fp_events
        .iter()
        .chain(manifest.cache_events.iter())
        .filter(|e| !available.contains(e))
        .map(String::as_str)
        .collect();
    if !unavailable.is_empty() {
        println!("Unavailable events: {}", unavailable.join(", "));
        println!();
    }

    let sets = event_sets(&manifest, InstrumentationKind::Papi, build_sets)?;
    println!("Planned event sets: {}", sets.len());
    for (index, set) in sets.iter().enumerate() {
        println!("  [{}] {}", index, set);
    }

    Ok(())
}

/// Costs command: evaluate the cost model for each benchmark and record
/// the values in the memo cache.
pub fn costs(
    manifest_path: &Path,
    benchmarks: &[String],
    preset: Option<&str>,
    cache_path: &Path,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let registry = load_registry(&manifest)?;
    let preset = preset.unwrap_or(&manifest.defaults.preset);
    let benchmarks = selected(&registry, benchmarks);

    let mut cache = CostCache::load(cache_path)
        .with_context(|| format!("Failed to load cost cache {}", cache_path.display()))?;
    let model = CommandCostModel;

    println!("Evaluating {} cost model for preset {}...", model.name(), preset);
    println!();

    let mut failed = 0;
    for benchmark in &benchmarks {
        let result = match registry.find(benchmark, default_backend()) {
            Ok(kernel) => {
                let parameters = kernel.parameters(preset);
                cache
                    .get_or_compute(benchmark, preset, || model.evaluate(kernel, &parameters))
                    .cloned()
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(values) => {
                let rendered: Vec<String> =
                    values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!("  {}: {}", benchmark, rendered.join(" "));
            }
            Err(e) => {
                failed += 1;
                println!("  {}: FAILED: {}", benchmark, e);
            }
        }
    }

    cache
        .save()
        .with_context(|| format!("Failed to write cost cache {}", cache_path.display()))?;

    println!();
    println!(
        "Evaluated {} benchmark(s), {} failed; cache at {}",
        benchmarks.len() - failed,
        failed,
        cache.path().display()
    );
    Ok(())
}

/// Metric table from a CSV file, or from a stored run joined with the
/// cached cost-model values.
/// The metric table to analyze and the columns joined from the cost cache.
fn load_table(args: &AnalyzeArgs) -> Result<(MetricTable, Vec<String>)> {
    if let Some(csv) = &args.csv {
        let table = MetricTable::load_csv(csv)
            .with_context(|| format!("Failed to read metric table {}", csv.display()))?;
        return Ok((table, Vec::new()));
    }

    let store_dir = args
        .store_dir
        .clone()
        .unwrap_or_else(|| RunConfig::default().store_dir);
    let store = ResultStore::open(&store_dir)
        .with_context(|| format!("Failed to open result store {}", store_dir.display()))?;

    let run_id = match args.run {
        Some(id) => RunId(id),
        None => store
            .latest_run()?
            .ok_or_else(|| anyhow!("No stored runs in {}", store_dir.display()))?,
    };
    println!("Analyzing run {}", run_id);

    let mut table = store.metric_table(run_id)?;
    if table.is_empty() {
        bail!("Run {} has no stored averages", run_id);
    }

    let mut cost_columns = Vec::new();
    if args.cache.exists() {
        let cache = CostCache::load(&args.cache)
            .with_context(|| format!("Failed to load cost cache {}", args.cache.display()))?;
        let costs = cache.metric_table(&args.preset);
        cost_columns = costs.columns().to_vec();
        table.merge(&costs);
    } else {
        warn!("no cost cache at {}", args.cache.display());
    }

    Ok((table, cost_columns))
}

/// Analyze command: correlation and fit reports.
pub fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let (mut table, cost_columns) = load_table(args)?;

    if !args.subjects.is_empty() {
        table.retain_subjects(&args.subjects);
    }
    table.remove_subjects(&args.exclude_subjects);
    if table.is_empty() {
        bail!("No subjects left to analyze");
    }

    if let (Some(flops), Some(bandwidth)) = (args.peak_flops, args.peak_bandwidth) {
        Machine::new(flops, bandwidth).annotate(
            &mut table,
            &args.work_column,
            &args.bytes_column,
            TIME_METRIC,
        );
    }

    // cost-model values are never measurements
    let unused_costs = cost_columns.iter().filter(|c| !args.predictors.contains(c));

    let analysis = Analyzer::new(&args.predictors)
        .exclude(&args.exclude_columns)
        .exclude(unused_costs)
        .top_n(args.top)
        .analyze(&table);

    let report = Report::new(&analysis);
    println!("{}", report.to_text());

    let written = report
        .write_dir(&args.output)
        .with_context(|| format!("Failed to write reports to {}", args.output.display()))?;
    println!("Reports written:");
    for path in written {
        println!("  {}", path.display());
    }

    Ok(())
}

/// List command: show the kernels registered by the manifest.
pub fn list_kernels(manifest_path: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let registry = load_registry(&manifest)?;

    println!("Experiment: {}", manifest.name);
    println!("Registered kernels: {}", registry.kernel_count());
    println!();

    for kernel in registry.iter() {
        let presets: Vec<&str> = kernel.presets.keys().map(String::as_str).collect();
        println!("  {} [{}]", kernel.benchmark, kernel.backend);
        if !presets.is_empty() {
            println!("    presets: {}", presets.join(", "));
        }
        if kernel.cost.is_some() {
            println!("    cost model: yes");
        }
    }

    Ok(())
}
