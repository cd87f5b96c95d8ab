//! Instrumentation buffers
//!
//! Identifier reads and writes observed by the backend hooks are recorded as
//! [`TraceEvent`]s. A run either collects them in a [`TraceSet`] or drops them
//! in a [`NoTrace`].

use crate::backend::Scope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One observed identifier access
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "access", rename_all = "lowercase")]
pub enum TraceEvent {
    Read { identifier: String, scope: Scope },
    Write { identifier: String, scope: Scope },
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEvent::Read { identifier, scope } => write!(f, "read {identifier} @ {scope}"),
            TraceEvent::Write { identifier, scope } => write!(f, "write {identifier} @ {scope}"),
        }
    }
}

/// Sink for trace events
pub trait Instrumentation {
    fn record(&mut self, event: TraceEvent);

    /// Forget everything recorded so far
    fn reset(&mut self);

    /// Recorded events in a deterministic order
    fn contents(&self) -> Vec<TraceEvent>;
}

/// Duplicate-collapsing collector; order of recording is irrelevant
#[derive(Debug, Default)]
pub struct TraceSet {
    events: BTreeSet<TraceEvent>,
}

impl TraceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Instrumentation for TraceSet {
    fn record(&mut self, event: TraceEvent) {
        self.events.insert(event);
    }

    fn reset(&mut self) {
        self.events.clear();
    }

    fn contents(&self) -> Vec<TraceEvent> {
        self.events.iter().cloned().collect()
    }
}

/// Collector that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl Instrumentation for NoTrace {
    fn record(&mut self, _event: TraceEvent) {}

    fn reset(&mut self) {}

    fn contents(&self) -> Vec<TraceEvent> {
        Vec::new()
    }
}

/// Render a trace as pretty-printed JSON
pub fn trace_to_json(events: &[TraceEvent]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(id: &str) -> TraceEvent {
        TraceEvent::Write {
            identifier: id.to_string(),
            scope: Scope::Global { init: false },
        }
    }

    #[test]
    fn test_trace_set_collapses_duplicates() {
        let mut set = TraceSet::new();
        set.record(write("x"));
        set.record(write("x"));
        set.record(write("y"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_trace_set_order_irrelevant() {
        let mut a = TraceSet::new();
        a.record(write("x"));
        a.record(write("y"));
        let mut b = TraceSet::new();
        b.record(write("y"));
        b.record(write("x"));
        assert_eq!(a.contents(), b.contents());
    }

    #[test]
    fn test_trace_set_reset() {
        let mut set = TraceSet::new();
        set.record(write("x"));
        set.reset();
        assert!(set.is_empty());
    }

    #[test]
    fn test_no_trace_records_nothing() {
        let mut none = NoTrace;
        none.record(write("x"));
        assert!(none.contents().is_empty());
    }

    #[test]
    fn test_trace_json() {
        let json = trace_to_json(&[write("x")]).unwrap();
        insta::assert_snapshot!(json, @r#"
        [
          {
            "access": "write",
            "identifier": "x",
            "scope": {
              "Global": {
                "init": false
              }
            }
          }
        ]
        "#);
    }
}
