//! Metrics reporting abstractions
//!
//! The engine reports counters through a trait so deployments can plug in
//! their own sink without the core depending on a concrete metrics system.
//! Sinks must be safe for concurrent use.

/// Counter names emitted by the read pipeline.
pub mod counters {
    /// A value was served (label `state`: `fresh`, `stale`, `fresh_after_sleep`).
    pub const CACHE_HIT: &str = "cache_hit";
    /// The leader recomputed and saved a value.
    pub const CACHE_FILL: &str = "cache_fill";
    /// No cached value could be served (label `cause`).
    pub const CACHE_MISS: &str = "cache_miss";
}

/// Sink for engine counters
pub trait MetricsSink: Send + Sync {
    /// Increment `counter` by one with the given labels.
    fn increment(&self, counter: &str, labels: &[(&str, &str)]);
}

/// Sink that discards all counters
pub struct NullSink;

impl MetricsSink for NullSink {
    fn increment(&self, _counter: &str, _labels: &[(&str, &str)]) {
        // No-op: discard all counters
    }
}

/// Sink that emits counters as debug logs
///
/// Useful in development and for deployments that scrape structured logs.
pub struct LogSink;

impl MetricsSink for LogSink {
    fn increment(&self, counter: &str, labels: &[(&str, &str)]) {
        if labels.is_empty() {
            log::debug!("counter {counter} += 1");
        } else {
            let rendered = labels
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            log::debug!("counter {counter}{{{rendered}}} += 1");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct TestSink {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl MetricsSink for TestSink {
        fn increment(&self, counter: &str, labels: &[(&str, &str)]) {
            let mut rendered = counter.to_string();
            for (name, value) in labels {
                rendered.push_str(&format!(" {name}={value}"));
            }
            self.events.lock().unwrap().push(rendered);
        }
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        sink.increment(counters::CACHE_HIT, &[("state", "fresh")]);
        sink.increment(counters::CACHE_FILL, &[]);
    }

    #[test]
    fn test_sink_receives_labels() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = TestSink {
            events: Arc::clone(&events),
        };

        sink.increment(counters::CACHE_MISS, &[("cause", "loader_failed")]);

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].contains("cache_miss"));
        assert!(recorded[0].contains("cause=loader_failed"));
    }
}
