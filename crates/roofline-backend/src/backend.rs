//! Collaborator traits.

use roofline_core::manifest::Parameters;
use roofline_core::{
    EventSet, InstrumentationConfig, InstrumentationReport, KernelSpec, OptimizationOutcome,
    Result,
};
use std::collections::BTreeMap;

/// Named input bindings handed to a compiled kernel for one invocation.
///
/// These are the problem-size parameters of the selected preset; the kernel
/// regenerates its input data from them on every call.
pub type InputBindings = Parameters;

/// Outcome of one kernel invocation.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Measured execution time in seconds.
    pub time: Option<f64>,
    /// Counter report, when the kernel was instrumented with counters.
    pub report: Option<InstrumentationReport>,
}

impl Invocation {
    pub fn timed(time: f64) -> Self {
        Self {
            time: Some(time),
            report: None,
        }
    }

    pub fn with_report(mut self, report: InstrumentationReport) -> Self {
        self.report = Some(report);
        self
    }
}

/// An executable, instrumented kernel produced by a [`Backend`].
pub trait CompiledKernel: Send + Sync {
    /// Benchmark this kernel was compiled from.
    fn benchmark(&self) -> &str;

    /// Instrumentation the kernel was compiled with.
    fn instrumentation(&self) -> &InstrumentationConfig;

    /// Execute the kernel once.
    ///
    /// Every call is a fresh, side-effecting measurement; nothing is cached
    /// between calls.
    fn invoke(&self, bindings: &InputBindings) -> Result<Invocation>;
}

/// Result of compiling a kernel.
pub struct Compilation {
    pub kernel: Box<dyn CompiledKernel>,
    pub optimization: OptimizationOutcome,
}

/// Trait defining the interface for compilation backends.
///
/// Backends are responsible for:
/// - Running the external compiler/optimizer on a kernel
/// - Instrumenting the result for the requested counters
/// - Handing back something that can be invoked repeatedly
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &'static str;

    /// Compile a kernel with the given instrumentation.
    ///
    /// An optional optimization step that could not be applied is reported
    /// through [`Compilation::optimization`], not as an error.
    fn compile(
        &self,
        kernel: &KernelSpec,
        instrumentation: &InstrumentationConfig,
    ) -> Result<Compilation>;
}

/// Static cost model evaluated for a kernel at a preset's parameters.
///
/// Returns metric name → value (e.g. `work`, `depth`, `bytes`).
pub trait CostModel {
    fn name(&self) -> &'static str;

    fn evaluate(&self, kernel: &KernelSpec, parameters: &Parameters)
        -> Result<BTreeMap<String, f64>>;
}

/// Answers "which events can be added to this set and still be measured in
/// one run".
pub trait CompatibilityOracle {
    fn addable(&mut self, current: &EventSet) -> Result<Vec<String>>;
}

impl<F> CompatibilityOracle for F
where
    F: FnMut(&EventSet) -> Result<Vec<String>>,
{
    fn addable(&mut self, current: &EventSet) -> Result<Vec<String>> {
        self(current)
    }
}
