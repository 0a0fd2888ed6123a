use std::collections::HashMap;
use std::time::Duration;

use crate::error::BenchError;
use crate::histogram::LatencyHistogram;

/// Named timers and counters recorded by one worker.
///
/// Names are chosen by the workload at call time, so both maps are created
/// lazily: the first sample for a name creates its histogram, the first
/// increment creates its counter at zero.
///
/// A `Metrics` value is owned by exactly one worker while the run is in progress
/// and is only read afterwards, so it carries no synchronization.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    timers: HashMap<String, LatencyHistogram>,
    counters: HashMap<String, i64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a latency sample in nanoseconds under `name`.
    pub fn record(&mut self, name: &str, nanos: u64) {
        // avoid allocating the key on the hot path once the timer exists
        match self.timers.get_mut(name) {
            Some(histogram) => histogram.record(nanos),
            None => {
                let mut histogram = LatencyHistogram::default();
                histogram.record(nanos);
                self.timers.insert(name.to_owned(), histogram);
            }
        }
    }

    /// Record a [`Duration`] under `name`, saturating at `u64::MAX` nanoseconds.
    pub fn record_duration(&mut self, name: &str, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.record(name, nanos);
    }

    /// Add `delta` (possibly negative) to the counter `name`.
    pub fn incr(&mut self, name: &str, delta: i64) {
        match self.counters.get_mut(name) {
            Some(value) => *value = value.saturating_add(delta),
            None => {
                self.counters.insert(name.to_owned(), delta);
            }
        }
    }

    pub fn timer(&self, name: &str) -> Option<&LatencyHistogram> {
        self.timers.get(name)
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    pub fn timers(&self) -> &HashMap<String, LatencyHistogram> {
        &self.timers
    }

    pub fn counters(&self) -> &HashMap<String, i64> {
        &self.counters
    }

    /// Fold `other` into `self`: histograms are merged by name and counters are
    /// summed, names missing on one side count as empty.
    ///
    /// Merging is associative and commutative, so folding workers in any order
    /// yields the same totals.
    pub fn merge(&mut self, other: &Metrics) -> Result<(), BenchError> {
        for (name, histogram) in &other.timers {
            match self.timers.get_mut(name) {
                Some(mine) => mine.merge(histogram)?,
                None => {
                    self.timers.insert(name.clone(), histogram.clone());
                }
            }
        }
        for (name, value) in &other.counters {
            let mine = self.counters.entry(name.clone()).or_insert(0);
            *mine = mine.saturating_add(*value);
        }
        Ok(())
    }

    /// Split into the timer and counter maps.
    pub fn into_parts(self) -> (HashMap<String, LatencyHistogram>, HashMap<String, i64>) {
        (self.timers, self.counters)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty() && self.counters.is_empty()
    }
}
