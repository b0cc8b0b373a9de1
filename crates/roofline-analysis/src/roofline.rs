//! Roofline bounds.

use crate::metrics::MetricTable;
use serde::{Deserialize, Serialize};

/// Column added by [`Machine::annotate`].
pub const ROOFLINE_PCT: &str = "roofline_pct";

/// Peak rates of the machine the kernels ran on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Peak compute rate (work units per second).
    pub peak_flops: f64,
    /// Peak memory bandwidth (bytes per second).
    pub peak_bandwidth: f64,
}

impl Machine {
    pub fn new(peak_flops: f64, peak_bandwidth: f64) -> Self {
        Self {
            peak_flops,
            peak_bandwidth,
        }
    }

    /// `min(peak compute, intensity × bandwidth)`.
    pub fn attainable(&self, intensity: f64) -> f64 {
        self.peak_flops.min(intensity * self.peak_bandwidth)
    }

    /// Intensity where the memory roof meets the compute roof.
    pub fn ridge_point(&self) -> f64 {
        self.peak_flops / self.peak_bandwidth
    }

    /// Achieved performance as a fraction of the attainable bound.
    ///
    /// NaN when any input is undefined or the time is not positive.
    pub fn roofline_fraction(&self, work: f64, bytes: f64, time: f64) -> f64 {
        let intensity = operational_intensity(work, bytes);
        if intensity.is_nan() || time <= 0.0 {
            return f64::NAN;
        }
        (work / time) / self.attainable(intensity)
    }

    /// Add a [`ROOFLINE_PCT`] column computed from the `work`, `bytes` and
    /// `time` columns. Subjects missing any of them get NaN.
    pub fn annotate(&self, table: &mut MetricTable, work: &str, bytes: &str, time: &str) {
        let subjects: Vec<_> = table.subjects().cloned().collect();
        for subject in subjects {
            let value = |column: &str| table.get(&subject, column).unwrap_or(f64::NAN);
            let pct = 100.0 * self.roofline_fraction(value(work), value(bytes), value(time));
            table.insert(subject, ROOFLINE_PCT, pct);
        }
    }
}

/// Work per byte of memory traffic; NaN when `bytes <= 0`.
pub fn operational_intensity(work: f64, bytes: f64) -> f64 {
    if bytes > 0.0 {
        work / bytes
    } else {
        f64::NAN
    }
}
