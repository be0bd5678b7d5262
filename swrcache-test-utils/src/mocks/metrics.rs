//! Recording metrics sink

use std::sync::Mutex;
use swrcache_core::MetricsSink;

/// Sink that keeps every increment for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedCounter>>,
}

/// One recorded increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCounter {
    pub counter: String,
    pub labels: Vec<(String, String)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded increments, in order.
    pub fn events(&self) -> Vec<RecordedCounter> {
        self.events.lock().unwrap().clone()
    }

    /// Number of increments of `counter` carrying every label in `labels`.
    pub fn count(&self, counter: &str, labels: &[(&str, &str)]) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| {
                event.counter == counter
                    && labels.iter().all(|(name, value)| {
                        event
                            .labels
                            .iter()
                            .any(|(n, v)| n == name && v == value)
                    })
            })
            .count()
    }
}

impl MetricsSink for RecordingSink {
    fn increment(&self, counter: &str, labels: &[(&str, &str)]) {
        self.events.lock().unwrap().push(RecordedCounter {
            counter: counter.to_string(),
            labels: labels
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        });
    }
}
