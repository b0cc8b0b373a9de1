//! Hardware counter event sets and instrumentation settings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered set of counter names measured together in one run.
///
/// Insertion order is kept; inserting a name twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSet(Vec<String>);

impl EventSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(event: impl Into<String>) -> Self {
        Self(vec![event.into()])
    }

    /// Insert an event, returning false when it was already present.
    pub fn insert(&mut self, event: impl Into<String>) -> bool {
        let event = event.into();
        if self.contains(&event) {
            return false;
        }
        self.0.push(event);
        true
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.iter().any(|e| e == event)
    }

    pub fn events(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for EventSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = EventSet::new();
        for event in iter {
            set.insert(event);
        }
        set
    }
}

impl fmt::Display for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Which instrumentation the compiled kernel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentationKind {
    /// Wall-clock timing only.
    #[default]
    Timer,
    /// PAPI hardware counters.
    Papi,
    /// LIKWID performance groups or events.
    Likwid,
}

impl InstrumentationKind {
    pub fn name(&self) -> &'static str {
        match self {
            InstrumentationKind::Timer => "timer",
            InstrumentationKind::Papi => "papi",
            InstrumentationKind::Likwid => "likwid",
        }
    }
}

/// Instrumentation settings handed to every compilation.
///
/// There is no process-wide "active counters" state: a kernel is compiled
/// for exactly the events carried here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    pub kind: InstrumentationKind,
    pub events: EventSet,
}

impl InstrumentationConfig {
    pub fn timer() -> Self {
        Self::default()
    }

    pub fn papi(events: EventSet) -> Self {
        Self {
            kind: InstrumentationKind::Papi,
            events,
        }
    }

    pub fn likwid(events: EventSet) -> Self {
        Self {
            kind: InstrumentationKind::Likwid,
            events,
        }
    }
}
