use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a measured subject (a benchmark or kernel name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered raw observations for one (subject, metric) pair.
///
/// Values are kept exactly as observed, including NaN and infinities, so
/// they can be persisted verbatim. Statistics must go through
/// [`SampleSeries::finite_values`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    pub subject: SubjectId,
    pub metric: String,
    values: Vec<f64>,
}

impl SampleSeries {
    pub fn new(subject: impl Into<SubjectId>, metric: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            metric: metric.into(),
            values: Vec::new(),
        }
    }

    /// Build a series from already collected values.
    pub fn from_values(
        subject: impl Into<SubjectId>,
        metric: impl Into<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            subject: subject.into(),
            metric: metric.into(),
            values,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        self.values.extend(values);
    }

    /// Raw values in repetition order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values that may take part in aggregate computations.
    pub fn finite_values(&self) -> Vec<f64> {
        self.values.iter().copied().filter(|v| v.is_finite()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
