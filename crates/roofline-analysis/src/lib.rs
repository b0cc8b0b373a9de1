//! Analysis of roofline measurements.
//!
//! This crate provides:
//! - Descriptive statistics of repeated samples
//! - Correlation of static cost-model predictions with measured metrics
//! - Identity-hypothesis fit quality and per-predictor overviews
//! - Subject × metric tables, roofline bounds and report rendering

pub mod aggregate;
pub mod analyzer;
pub mod correlate;
pub mod fit;
pub mod metrics;
pub mod report;
pub mod roofline;

pub use aggregate::aggregate;
pub use analyzer::{Analysis, Analyzer};
pub use correlate::{correlate, SubjectValues};
pub use fit::evaluate_fit;
pub use metrics::MetricTable;
pub use report::Report;
pub use roofline::Machine;
