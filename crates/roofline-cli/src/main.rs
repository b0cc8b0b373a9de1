//! CLI tool for the roofline measurement toolchain.
//!
//! Provides commands for collecting counter samples, evaluating cost
//! models, and correlating the two.

mod commands;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use roofline_core::InstrumentationKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roofline")]
#[command(about = "Roofline measurement and analysis CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Experiment manifest (JSON)
    #[arg(long, short, global = true, default_value = "roofline.json")]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Measure benchmarks and store the results
    Collect {
        /// Benchmarks to measure (all registered if none given)
        benchmarks: Vec<String>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List available counters and the planned event sets
    Events {
        /// Measure every cache event alone instead of grouping them
        #[arg(long)]
        no_event_sets: bool,
    },

    /// Evaluate the cost model and fill the memo cache
    Costs {
        /// Benchmarks to evaluate (all registered if none given)
        benchmarks: Vec<String>,

        /// Problem size preset
        #[arg(long, short)]
        preset: Option<String>,

        /// Memo cache file
        #[arg(long, default_value = "bench_works.json")]
        cache: PathBuf,
    },

    /// Correlate cost-model predictions with measurements
    Analyze(AnalyzeArgs),

    /// List all registered kernels
    List,
}

/// Overrides of the manifest's run settings.
#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Repetitions per event set
    #[arg(long, short)]
    pub repetitions: Option<usize>,

    /// Problem size preset
    #[arg(long, short)]
    pub preset: Option<String>,

    /// Skip the unmeasured warmup invocation
    #[arg(long)]
    pub no_warmup: bool,

    /// Evict caches with this many MiB per core before each trial
    #[arg(long)]
    pub flush_cache_mb: Option<usize>,

    /// Measure every cache event alone instead of grouping them
    #[arg(long)]
    pub no_event_sets: bool,

    /// Instrumentation to compile in
    #[arg(long, short, value_enum)]
    pub instrumentation: Option<Instrumentation>,

    /// Result store directory
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Metric table CSV (first column `benchmark`) instead of a stored run
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Result store directory
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Stored run to analyze (latest if not specified)
    #[arg(long)]
    pub run: Option<i64>,

    /// Memo cache with the cost-model values to join
    #[arg(long, default_value = "bench_works.json")]
    pub cache: PathBuf,

    /// Preset of the cost-model values
    #[arg(long, short, default_value = "S")]
    pub preset: String,

    /// Symbolic metric columns to correlate against every measured column
    #[arg(long = "predictor", default_values_t = default_predictors())]
    pub predictors: Vec<String>,

    /// Columns left out of the analysis
    #[arg(long = "exclude-column", default_values_t = vec!["work".to_string()])]
    pub exclude_columns: Vec<String>,

    /// Only analyze these subjects
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Leave these subjects out
    #[arg(long = "exclude-subject")]
    pub exclude_subjects: Vec<String>,

    /// Measured metrics listed per predictor
    #[arg(long, default_value_t = roofline_analysis::analyzer::DEFAULT_TOP_N)]
    pub top: usize,

    /// Directory for the CSV and JSON reports
    #[arg(long, short, default_value = "analysis")]
    pub output: PathBuf,

    /// Peak compute rate, enables the roofline_pct column
    #[arg(long, requires = "peak_bandwidth")]
    pub peak_flops: Option<f64>,

    /// Peak memory bandwidth in bytes per second
    #[arg(long, requires = "peak_flops")]
    pub peak_bandwidth: Option<f64>,

    /// Work column used for roofline_pct
    #[arg(long, default_value = "work")]
    pub work_column: String,

    /// Byte column used for roofline_pct
    #[arg(long, default_value = "Symbolic Bytes")]
    pub bytes_column: String,
}

fn default_predictors() -> Vec<String> {
    vec![
        "Symbolic Bytes".to_string(),
        "symbolic_volume_write_bytes".to_string(),
        "symbolic_volume_read_bytes".to_string(),
    ]
}

/// Instrumentation choices on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Instrumentation {
    /// Wall-clock timing only
    Timer,
    /// PAPI hardware counters (default)
    Papi,
    /// LIKWID events
    Likwid,
}

impl From<Instrumentation> for InstrumentationKind {
    fn from(value: Instrumentation) -> Self {
        match value {
            Instrumentation::Timer => InstrumentationKind::Timer,
            Instrumentation::Papi => InstrumentationKind::Papi,
            Instrumentation::Likwid => InstrumentationKind::Likwid,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect { benchmarks, run } => commands::collect(&cli.manifest, &benchmarks, &run),
        Commands::Events { no_event_sets } => commands::events(&cli.manifest, !no_event_sets),
        Commands::Costs {
            benchmarks,
            preset,
            cache,
        } => commands::costs(&cli.manifest, &benchmarks, preset.as_deref(), &cache),
        Commands::Analyze(args) => commands::analyze(&args),
        Commands::List => commands::list_kernels(&cli.manifest),
    }
}
