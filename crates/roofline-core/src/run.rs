use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier tagging every row written by one collection run.
///
/// Milliseconds since the Unix epoch (UTC) at the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl RunId {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Minutes elapsed between this run's start and `now`.
    pub fn elapsed_minutes(&self, now: RunId) -> f64 {
        (now.0 - self.0) as f64 / (1000.0 * 60.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
