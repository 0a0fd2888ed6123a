//! The benchmark runner that glues workers, rate limiting and aggregation together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::aggregate::aggregate;
use crate::config::BenchConfig;
use crate::context::RunContext;
use crate::error::BenchError;
use crate::executor::{Deadline, TokenStream, spawn_workers};
use crate::histogram::LatencyHistogram;
use crate::workload::Workload;

/// Aggregated outcome of a run. Populated once, after every worker stopped.
#[derive(Debug, Clone, Default)]
pub struct BenchResult {
    pub name: String,
    pub concurrency: usize,
    /// Configured rate limit, `None` for a continuous run.
    pub rate: Option<u32>,
    /// Time from just before the workers started to just after the last one
    /// stopped. Aggregation is not included.
    pub elapsed: Duration,
    pub total_calls: u64,
    pub timers: HashMap<String, LatencyHistogram>,
    pub counters: HashMap<String, i64>,
}

impl BenchResult {
    /// Achieved throughput in calls per second.
    pub fn throughput(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        self.total_calls as f64 / self.elapsed.as_secs_f64()
    }
}

/// Aborts the spawned workers if [`Bench::run`] is dropped before they are joined.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn fresh_contexts(concurrency: usize) -> Vec<RunContext> {
    (1..=concurrency).map(RunContext::new).collect()
}

/// Drives a [`Workload`] from `concurrency` workers for a fixed duration.
///
/// One [`RunContext`] per worker is created up front, so worker ids `1..=N` are
/// stable before the run starts. [`Bench::run`] spawns the workers, waits for all
/// of them to stop and folds their contexts into a [`BenchResult`].
///
/// A `Bench` runs once: calling [`Bench::run`] again after calls were recorded
/// returns the existing result without running anything.
///
/// # Example
/// ```rust
/// use benchrun::{Bench, BenchConfig, from_fn};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "multi_thread")]
/// # async fn main() -> Result<(), benchrun::BenchError> {
/// let config = BenchConfig::builder()
///     .concurrency(2)
///     .duration(Duration::from_millis(50))
///     .build();
/// let mut bench = Bench::new(
///     config,
///     from_fn(|ctx| {
///         Box::pin(async move {
///             tokio::time::sleep(Duration::from_millis(5)).await;
///             ctx.incr("calls", 1);
///         })
///     }),
/// )?;
///
/// let result = bench.run().await?;
/// assert_eq!(result.counters["calls"] as u64, result.total_calls);
/// # Ok(())
/// # }
/// ```
pub struct Bench<W: Workload> {
    config: BenchConfig,
    workload: Arc<W>,
    contexts: Vec<RunContext>,
    result: BenchResult,
    finished: bool,
}

impl<W: Workload> Bench<W> {
    /// Validate `config` and prepare one context per worker.
    pub fn new(config: BenchConfig, workload: W) -> Result<Self, BenchError> {
        config.validate()?;
        let contexts = fresh_contexts(config.concurrency);
        Ok(Self {
            config,
            workload: Arc::new(workload),
            contexts,
            result: BenchResult::default(),
            finished: false,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Per-worker state, ordered by worker id. Only meaningful once
    /// [`Bench::run`] has returned.
    pub fn contexts(&self) -> &[RunContext] {
        &self.contexts
    }

    /// The aggregated result, `None` until a run has completed.
    pub fn result(&self) -> Option<&BenchResult> {
        self.finished.then_some(&self.result)
    }

    /// Run the benchmark and return the aggregated result.
    ///
    /// Resolves once every worker has stopped and aggregation is done. Calls still
    /// in flight at the deadline are allowed to finish. Must be awaited within a
    /// Tokio runtime, preferably multi-threaded.
    ///
    /// Dropping the future before it resolves aborts the workers and leaves the
    /// bench as if it never ran, so it can be run again.
    pub async fn run(&mut self) -> Result<&BenchResult, BenchError> {
        if self.result.total_calls != 0 {
            tracing::debug!("Bench {} already ran, skipping.", self.config.name);
            return Ok(&self.result);
        }

        let rate = self.config.target_rate();
        let tokens = rate.map(|rate| Arc::new(TokenStream::new(rate)));

        tracing::info!(
            "Spawning {} workers for {} ({:?}, rate: {:?})...",
            self.config.concurrency,
            self.config.name,
            self.config.duration,
            rate
        );
        // empty placeholders stay behind until the workers hand theirs back
        let contexts = std::mem::replace(
            &mut self.contexts,
            fresh_contexts(self.config.concurrency),
        );
        let start = Instant::now();
        let deadline = Deadline::at(start + self.config.duration);
        let handles = spawn_workers(contexts, deadline, tokens.clone(), self.workload.clone());
        let guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        tracing::info!("Running bench: {}!", self.config.name);
        let joined = join_all(handles).await;
        let elapsed = start.elapsed();
        drop(guard);
        if let Some(tokens) = &tokens {
            tokens.stop();
        }

        tracing::info!("Retrieving data from workers...");
        self.contexts = joined
            .into_iter()
            .enumerate()
            .map(|(i, res)| match res {
                Ok(ctx) => ctx,
                Err(e) => {
                    tracing::error!("Worker {} panicked with error: {e}", i + 1);
                    // keep the other workers' data instead of failing the whole run
                    RunContext::new(i + 1)
                }
            })
            .collect();

        tracing::info!("Processing results...");
        let totals = aggregate(&self.contexts)?;
        let (timers, counters) = totals.metrics.into_parts();
        self.result = BenchResult {
            name: self.config.name.clone(),
            concurrency: self.config.concurrency,
            rate,
            elapsed,
            total_calls: totals.total_calls,
            timers,
            counters,
        };
        self.finished = true;

        tracing::info!(
            "Done running bench: {} ({} calls in {:?})!",
            self.config.name,
            self.result.total_calls,
            elapsed
        );
        Ok(&self.result)
    }
}
