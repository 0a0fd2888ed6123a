//! Benchrun: a small load-generation and latency-measurement harness.
//!
//! Benchrun drives a user-supplied [`Workload`] from a fixed number of concurrent
//! workers for a fixed duration, either as fast as possible or paced to a target
//! rate, and folds everything the workers recorded into one [`BenchResult`].
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`Workload`]: the unit of work under test. It receives the worker's
//!   [`RunContext`] on every call and records its own timings and counters there.
//! - [`RunContext`]: per-worker state: iteration counter, named latency timers,
//!   named counters and a scratch space for per-worker resources. It is never
//!   shared, so recording a sample costs a map lookup and a histogram update.
//! - [`TokenStream`]: rate limiter producing permits at a constant cadence into a
//!   bounded pool. Only used when a rate is configured.
//! - [`Bench`]: owns the contexts, spawns one worker per context, enforces the
//!   deadline and waits for every worker before aggregating.
//! - [`aggregate()`]: merges timers by name and sums counters and iterations.
//! - [`BenchReport`] and [`Reporter`]: turn the result into percentiles and print
//!   or export it.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//!
//! use benchrun::{Bench, BenchConfig, BenchReport, Reporter, StdoutReporter, from_fn};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), benchrun::BenchError> {
//!     let config = BenchConfig::builder()
//!         .name("sleep")
//!         .concurrency(2)
//!         .duration(Duration::from_millis(100))
//!         .rate(50)
//!         .build();
//!
//!     let mut bench = Bench::new(
//!         config,
//!         from_fn(|ctx| {
//!             Box::pin(async move {
//!                 let start = Instant::now();
//!                 tokio::time::sleep(Duration::from_millis(2)).await;
//!                 ctx.timer("sleep", start.elapsed());
//!                 ctx.incr("calls", 1);
//!             })
//!         }),
//!     )?;
//!
//!     let result = bench.run().await?;
//!     StdoutReporter.report(&BenchReport::from(result)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//!
//! - `macros`: enables the [`macro@workload`] attribute that turns an `async fn` into a
//!   [`Workload`]. (Enabled by default)
//! - `internals`: exposes the worker loops, the run `Deadline` and the token
//!   arithmetic used by the engine.

// lets the proc macros refer to `::benchrun` from inside this crate as well
extern crate self as benchrun;

/// Folding worker state into process-wide totals
pub mod aggregate;
/// Benchmark runner
pub mod bench;
/// Run configuration
pub mod config;
/// Per-worker state
pub mod context;
pub mod error;
/// Worker loops, deadline and rate limiting
pub mod executor;
/// Latency histogram adapter
pub mod histogram;
/// Named timers and counters
pub mod metric;
/// Reports and Reporters
pub mod report;
/// The benchmarked unit of work
pub mod workload;

pub use aggregate::{Aggregate, aggregate};
pub use bench::{Bench, BenchResult};
pub use config::BenchConfig;
pub use context::{DEFAULT_TIMER, RunContext};
pub use error::BenchError;
pub use executor::TokenStream;
pub use histogram::LatencyHistogram;
pub use metric::Metrics;
pub use report::{BenchReport, JsonReporter, Percentiles, Reporter, StdoutReporter};
pub use workload::{FnWorkload, TimedWorkload, Workload, from_fn, timed};

pub use async_trait::async_trait;

#[cfg(feature = "macros")]
pub use benchrun_macros::workload;
