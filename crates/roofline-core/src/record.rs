//! Records derived from sample series.
//!
//! Every record is a pure function of the data it was computed from and is
//! never updated after creation.

use crate::sample::SubjectId;
use serde::{Deserialize, Serialize};

/// Sentinel for a relative standard deviation that has no meaning
/// (the mean is zero or negative, or there are no finite samples).
pub const UNDEFINED_RELATIVE_STDDEV: f64 = -1.0;

/// Descriptive statistics of one sample series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub subject: SubjectId,
    pub metric: String,
    /// Number of finite samples the statistics were computed from.
    pub count: usize,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub mean: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub median: f64,
    /// Population variance (divisor = count).
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub variance: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub stddev: f64,
    /// `stddev / mean * 100`, or [`UNDEFINED_RELATIVE_STDDEV`].
    pub stddev_pct: f64,
    /// Mean trial time in seconds, when timings were collected alongside.
    #[serde(default)]
    pub time: Option<f64>,
}

impl AggregateRecord {
    pub fn with_time(mut self, time: Option<f64>) -> Self {
        self.time = time;
        self
    }

    pub fn has_relative_stddev(&self) -> bool {
        self.stddev_pct != UNDEFINED_RELATIVE_STDDEV
    }
}

/// Correlation coefficients between a predictor and a measured metric.
///
/// Undefined coefficients are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub predictor: String,
    pub measured: String,
    /// Number of subjects where both values were defined.
    pub points: usize,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub pearson: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub spearman: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub kendall: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub pearson_loglog: f64,
}

impl CorrelationRecord {
    /// True when every coefficient is NaN.
    pub fn is_undefined(&self) -> bool {
        self.pearson.is_nan()
            && self.spearman.is_nan()
            && self.kendall.is_nan()
            && self.pearson_loglog.is_nan()
    }
}

/// Identity-hypothesis fit quality of a predictor against a measured metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub predictor: String,
    pub measured: String,
    pub points: usize,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub rmse: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub rmae: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub r2: f64,
}

/// Mean of each correlation coefficient across the measured metrics paired
/// with one predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationOverview {
    pub predictor: String,
    pub pairs: usize,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub pearson: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub spearman: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub kendall: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub pearson_loglog: f64,
}

/// Mean fit metrics across the measured metrics paired with one predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOverview {
    pub predictor: String,
    pub pairs: usize,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub rmse: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub rmae: f64,
    #[serde(deserialize_with = "crate::nan::deserialize")]
    pub r2: f64,
}
