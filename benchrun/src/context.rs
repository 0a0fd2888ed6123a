//! Per-worker state handed to the workload on every call.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::time::Duration;

use crate::histogram::LatencyHistogram;
use crate::metric::Metrics;

/// Timer used by [`RunContext::record_time`] and by [`crate::timed`] workloads.
pub const DEFAULT_TIMER: &str = "latency";

/// Percentiles printed in the per-worker summary.
const WORKER_PERCENTILES: [f64; 3] = [50.0, 99.9, 100.0];

/// Mutable state owned by a single worker for the whole run.
///
/// A `RunContext` is created before the run starts, moved into its worker, and
/// handed back once the worker stops. It is never shared between workers, so
/// recording a sample is a plain map update.
///
/// Besides metrics, the context carries a scratch space where a workload can keep
/// per-worker resources (a connection, a client, a buffer) across iterations.
///
/// # Example
/// ```rust
/// use benchrun::RunContext;
/// use std::time::Duration;
///
/// let mut ctx = RunContext::new(1);
/// ctx.timer("query", Duration::from_millis(3));
/// ctx.incr("rows", 12);
/// let buf: &mut Vec<u8> = ctx.value_or_insert_with("buf", Vec::new);
/// buf.push(1);
/// assert_eq!(ctx.counter("rows"), Some(12));
/// ```
pub struct RunContext {
    id: usize,
    iteration: u64,
    metrics: Metrics,
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl RunContext {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            iteration: 0,
            metrics: Metrics::new(),
            values: HashMap::new(),
        }
    }

    /// Worker identifier, `1..=concurrency`.
    pub fn id(&self) -> usize {
        self.id
    }

    /// 1-based ordinal of the call in progress; after the run, the total number
    /// of calls made by this worker.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Bump the iteration counter. Called by the worker loop right before the
    /// workload is invoked.
    pub(crate) fn advance(&mut self) -> u64 {
        self.iteration += 1;
        self.iteration
    }

    /// Record `elapsed` under the timer `name`.
    pub fn timer(&mut self, name: &str, elapsed: Duration) {
        self.metrics.record_duration(name, elapsed);
    }

    /// Record a raw nanosecond sample. Negative values are recorded as zero.
    pub fn timer_nanos(&mut self, name: &str, nanos: i64) {
        self.metrics.record(name, nanos.max(0) as u64);
    }

    /// Record `elapsed` under [`DEFAULT_TIMER`].
    pub fn record_time(&mut self, elapsed: Duration) {
        self.timer(DEFAULT_TIMER, elapsed);
    }

    /// Add `delta` to the counter `name`.
    pub fn incr(&mut self, name: &str, delta: i64) {
        self.metrics.incr(name, delta);
    }

    pub fn timer_by_name(&self, name: &str) -> Option<&LatencyHistogram> {
        self.metrics.timer(name)
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.metrics.counter(name)
    }

    /// Every timer this worker recorded, by name.
    pub fn timers(&self) -> &HashMap<String, LatencyHistogram> {
        self.metrics.timers()
    }

    /// Every counter this worker touched, by name.
    pub fn counters(&self) -> &HashMap<String, i64> {
        self.metrics.counters()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Store a worker-local value under `key`, replacing any previous one.
    pub fn set_value<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Borrow the value stored under `key` if it exists and has type `T`.
    pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn value_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Take the value out of the scratch space. A value of another type is left
    /// untouched.
    pub fn remove_value<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Get the value under `key`, creating it with `init` first if it is missing
    /// or has a different type.
    pub fn value_or_insert_with<T, F>(&mut self, key: &str, init: F) -> &mut T
    where
        T: Any + Send,
        F: FnOnce() -> T,
    {
        let slot = match self.values.entry(key.to_owned()) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                if !slot.is::<T>() {
                    *slot = Box::new(init());
                }
                slot
            }
            Entry::Vacant(entry) => entry.insert(Box::new(init())),
        };
        slot.downcast_mut::<T>()
            .unwrap_or_else(|| unreachable!("slot holds a value of the requested type"))
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("id", &self.id)
            .field("iteration", &self.iteration)
            .field("metrics", &self.metrics)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Worker: {}, Total runs: {}", self.id, self.iteration)?;

        let mut timers: Vec<_> = self.metrics.timers().iter().collect();
        timers.sort_by(|a, b| a.0.cmp(b.0));
        for (name, histogram) in timers {
            writeln!(f, "  Timer: {name}")?;
            for p in WORKER_PERCENTILES {
                let millis = histogram.value_at_percentile(p) as f64 / 1_000_000.0;
                writeln!(f, "  {p:.1}th percentile: {millis:.2}ms")?;
            }
        }

        let mut counters: Vec<_> = self.metrics.counters().iter().collect();
        counters.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in counters {
            writeln!(f, "  Counter: {name}, value: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_one_based() {
        let mut ctx = RunContext::new(3);
        assert_eq!(ctx.iteration(), 0);
        assert_eq!(ctx.advance(), 1);
        assert_eq!(ctx.advance(), 2);
        assert_eq!(ctx.id(), 3);
    }

    #[test]
    fn negative_nanos_are_recorded_as_zero() {
        let mut ctx = RunContext::new(1);
        ctx.timer_nanos("skew", -250);
        let h = ctx.timer_by_name("skew").unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.max(), 0);
    }

    #[test]
    fn record_time_uses_default_timer() {
        let mut ctx = RunContext::new(1);
        ctx.record_time(Duration::from_micros(5));
        assert_eq!(ctx.timer_by_name(DEFAULT_TIMER).map(|h| h.len()), Some(1));
    }

    #[test]
    fn timers_and_counters_by_name() {
        let mut ctx = RunContext::new(1);
        assert!(ctx.timers().is_empty());
        assert!(ctx.counters().is_empty());

        ctx.timer("read", Duration::from_millis(1));
        ctx.timer("write", Duration::from_millis(2));
        ctx.incr("errors", 2);

        let mut timers: Vec<&str> = ctx.timers().keys().map(String::as_str).collect();
        timers.sort_unstable();
        assert_eq!(timers, ["read", "write"]);
        assert_eq!(ctx.counters().get("errors"), Some(&2));
    }

    #[test]
    fn scratch_values_are_typed() {
        let mut ctx = RunContext::new(1);
        ctx.set_value("conn", String::from("tcp://localhost"));

        assert_eq!(
            ctx.value::<String>("conn").map(String::as_str),
            Some("tcp://localhost")
        );
        assert!(ctx.value::<u32>("conn").is_none());
        assert!(ctx.value::<String>("missing").is_none());

        ctx.value_mut::<String>("conn").unwrap().push_str(":80");
        assert_eq!(ctx.remove_value::<u32>("conn"), None);
        assert_eq!(
            ctx.remove_value::<String>("conn").as_deref(),
            Some("tcp://localhost:80")
        );
        assert!(ctx.value::<String>("conn").is_none());
    }

    #[test]
    fn value_or_insert_with_reuses_existing_value() {
        let mut ctx = RunContext::new(1);
        let mut created = 0;
        for _ in 0..3 {
            let v: &mut u64 = ctx.value_or_insert_with("hits", || {
                created += 1;
                0
            });
            *v += 1;
        }
        assert_eq!(created, 1);
        assert_eq!(ctx.value::<u64>("hits"), Some(&3));
    }

    #[test]
    fn value_or_insert_with_replaces_other_type() {
        let mut ctx = RunContext::new(1);
        ctx.set_value("slot", "text");
        let v: &mut i32 = ctx.value_or_insert_with("slot", || 7);
        assert_eq!(*v, 7);
    }

    #[test]
    fn display_lists_metrics_sorted() {
        let mut ctx = RunContext::new(2);
        ctx.advance();
        ctx.timer("b", Duration::from_millis(2));
        ctx.timer("a", Duration::from_millis(1));
        ctx.incr("calls", 1);

        let out = ctx.to_string();
        assert!(out.starts_with("Worker: 2, Total runs: 1\n"));
        let a = out.find("Timer: a").unwrap();
        let b = out.find("Timer: b").unwrap();
        assert!(a < b);
        assert!(out.contains("Counter: calls, value: 1"));
    }
}
