//! Subprocess backend.
//!
//! Compilation, execution and cost analysis are delegated to external
//! programs named in the kernel's [`KernelSpec`]. The programs talk back
//! through the `ROOFLINE_*` line protocol (see [`roofline_core::ipc`]).
//!
//! Every program receives:
//! - `--input <json>` with the preset's parameters (run and cost commands)
//! - `ROOFLINE_INSTRUMENT` = `timer` | `papi` | `likwid`
//! - `ROOFLINE_EVENTS` = comma separated counter names

use crate::backend::{
    Backend, Compilation, CompiledKernel, CostModel, InputBindings, Invocation,
};
use log::{debug, warn};
use roofline_core::ipc::{parse_line, IpcMessage};
use roofline_core::manifest::Parameters;
use roofline_core::{
    Error, InstrumentationConfig, InstrumentationReport, KernelSpec, OptimizationOutcome, Result,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Instant;
use walkdir::WalkDir;

/// Environment variable carrying the instrumentation kind.
pub const INSTRUMENT_ENV: &str = "ROOFLINE_INSTRUMENT";

/// Environment variable carrying the active counter names.
pub const EVENTS_ENV: &str = "ROOFLINE_EVENTS";

/// Backend that drives external programs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBackend;

impl CommandBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn compile(
        &self,
        kernel: &KernelSpec,
        instrumentation: &InstrumentationConfig,
    ) -> Result<Compilation> {
        let mut optimization = OptimizationOutcome::Unknown;

        if let Some(argv) = &kernel.compile {
            let output = run_program(argv, kernel, instrumentation, None)?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                if let IpcMessage::Optimize(outcome) = parse_line(line)? {
                    optimization = outcome;
                }
            }
        }

        if let OptimizationOutcome::Skipped { reason } = &optimization {
            warn!(
                "{}: optimization skipped, proceeding unoptimized ({})",
                kernel.benchmark, reason
            );
        }

        Ok(Compilation {
            kernel: Box::new(CommandKernel {
                spec: kernel.clone(),
                instrumentation: instrumentation.clone(),
            }),
            optimization,
        })
    }
}

/// A kernel executed by running its `run` command.
#[derive(Debug, Clone)]
pub struct CommandKernel {
    spec: KernelSpec,
    instrumentation: InstrumentationConfig,
}

impl CompiledKernel for CommandKernel {
    fn benchmark(&self) -> &str {
        &self.spec.benchmark
    }

    fn instrumentation(&self) -> &InstrumentationConfig {
        &self.instrumentation
    }

    fn invoke(&self, bindings: &InputBindings) -> Result<Invocation> {
        let previous = self.spec.report_dir.as_deref().and_then(latest_report_file);

        let started = Instant::now();
        let output = run_program(&self.spec.run, &self.spec, &self.instrumentation, Some(bindings))?;
        let wall = started.elapsed().as_secs_f64();

        let mut invocation = Invocation::default();
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            match parse_line(line)? {
                IpcMessage::Time(seconds) => invocation.time = Some(seconds),
                IpcMessage::Report(report) => invocation.report = Some(report),
                IpcMessage::Unknown(text) => debug!("{}: {}", self.spec.benchmark, text),
                _ => {}
            }
        }

        if invocation.time.is_none() {
            debug!(
                "{}: no reported time, using process wall time {:.6}s",
                self.spec.benchmark, wall
            );
            invocation.time = Some(wall);
        }

        if invocation.report.is_none() && !self.instrumentation.events.is_empty() {
            if let Some(dir) = &self.spec.report_dir {
                let latest = latest_report_file(dir).ok_or_else(|| {
                    Error::Collaborator(format!(
                        "{}: no instrumentation report found in {}",
                        self.spec.benchmark,
                        dir.display()
                    ))
                })?;
                if previous.as_ref() == Some(&latest) {
                    return Err(Error::Collaborator(format!(
                        "{}: invocation did not write a new report to {}",
                        self.spec.benchmark,
                        dir.display()
                    )));
                }
                invocation.report = Some(InstrumentationReport::load(&latest)?);
            }
        }

        Ok(invocation)
    }
}

/// Cost model evaluated by running the kernel's `cost` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCostModel;

impl CostModel for CommandCostModel {
    fn name(&self) -> &'static str {
        "command"
    }

    fn evaluate(
        &self,
        kernel: &KernelSpec,
        parameters: &Parameters,
    ) -> Result<BTreeMap<String, f64>> {
        let argv = kernel.cost.as_ref().ok_or_else(|| {
            Error::Collaborator(format!("{}: no cost command configured", kernel.benchmark))
        })?;

        let output = run_program(argv, kernel, &InstrumentationConfig::timer(), Some(parameters))?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut costs = BTreeMap::new();
        for line in stdout.lines() {
            if let IpcMessage::Cost(values) = parse_line(line)? {
                costs.extend(values);
            }
        }

        if costs.is_empty() {
            return Err(Error::Collaborator(format!(
                "{}: cost command reported no metrics",
                kernel.benchmark
            )));
        }
        Ok(costs)
    }
}

/// Run a collaborator program and fail on a non-zero exit.
fn run_program(
    argv: &[String],
    kernel: &KernelSpec,
    instrumentation: &InstrumentationConfig,
    bindings: Option<&InputBindings>,
) -> Result<Output> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        Error::Collaborator(format!("{}: empty command line", kernel.benchmark))
    })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .env(INSTRUMENT_ENV, instrumentation.kind.name())
        .env(EVENTS_ENV, instrumentation.events.to_string());

    if let Some(dir) = &kernel.workdir {
        cmd.current_dir(dir);
    }

    if let Some(bindings) = bindings {
        cmd.arg("--input").arg(serde_json::to_string(bindings)?);
    }

    debug!("{}: running {:?}", kernel.benchmark, cmd);
    let output = cmd
        .output()
        .map_err(|e| Error::Collaborator(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Collaborator(format!(
            "{} exited with code {}: {}",
            program,
            code,
            stderr.trim()
        )));
    }

    Ok(output)
}

/// Newest `*.json` report under a directory. Report files are named by
/// timestamp, so the greatest file name is the newest.
pub fn latest_report_file(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .max_by(|a, b| a.file_name().cmp(b.file_name()))
        .map(|entry| entry.into_path())
}
