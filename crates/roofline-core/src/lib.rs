//! Core types and schemas for the roofline measurement toolchain.
//!
//! This crate defines the data structures shared by every other crate:
//! sample series, aggregate/correlation/fit records, event sets, the kernel
//! registry, the experiment manifest, the collaborator line protocol and the
//! error type. It contains no measurement or statistics logic.

pub mod error;
pub mod event;
pub mod ipc;
pub mod manifest;
pub mod nan;
pub mod record;
pub mod registry;
pub mod report;
pub mod run;
pub mod sample;

pub use error::{Error, Result};
pub use event::{EventSet, InstrumentationConfig, InstrumentationKind};
pub use manifest::{ExperimentManifest, KernelSpec, RunConfig};
pub use record::{
    AggregateRecord, CorrelationOverview, CorrelationRecord, FitOverview, FitRecord,
};
pub use registry::KernelRegistry;
pub use report::{InstrumentationReport, OptimizationOutcome};
pub use run::RunId;
pub use sample::{SampleSeries, SubjectId};
