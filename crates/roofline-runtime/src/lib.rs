//! Measurement runtime for roofline experiments.
//!
//! This crate provides:
//! - Repeated sample collection around side-effecting trials
//! - Partitioning of counters into jointly measurable event sets
//! - Cache flushing between timed trials
//! - The append-only result store and the cost-model memo cache
//! - The batch executor with per-subject failure isolation

pub mod cache;
pub mod collector;
pub mod executor;
pub mod memo;
pub mod partition;
pub mod store;

pub use collector::{collect, collect_trials, TrialValue};
pub use executor::{summary_line, BatchOutcome, Executor, SubjectMeasurement};
pub use memo::CostCache;
pub use partition::{partition, plan_event_sets};
pub use store::{EventAverageRow, EventCountRow, ResultStore};
