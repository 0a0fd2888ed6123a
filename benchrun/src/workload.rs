use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::RunContext;

/// The unit of work being benchmarked.
///
/// `call` is invoked once per iteration by every worker, never concurrently for the
/// same [`RunContext`], but concurrently across workers. The engine does not
/// inspect the outcome: a workload that wants failures to show up in the report
/// records them itself, usually with a counter.
///
/// Workloads run on the Tokio runtime driving [`crate::Bench::run`]; blocking
/// inside `call` stalls the worker thread it runs on.
///
/// # Example
/// ```rust
/// use benchrun::{RunContext, Workload, async_trait};
/// use std::time::Instant;
///
/// struct Sleepy;
///
/// #[async_trait]
/// impl Workload for Sleepy {
///     async fn call(&self, ctx: &mut RunContext) {
///         let start = Instant::now();
///         tokio::time::sleep(std::time::Duration::from_millis(1)).await;
///         ctx.timer("sleep", start.elapsed());
///         ctx.incr("calls", 1);
///     }
/// }
/// ```
#[async_trait]
pub trait Workload: Send + Sync + 'static {
    async fn call(&self, ctx: &mut RunContext);
}

/// Workload backed by a closure returning a boxed future. See [`from_fn`].
pub struct FnWorkload<F>(F);

#[async_trait]
impl<F> Workload for FnWorkload<F>
where
    F: for<'a> Fn(&'a mut RunContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut RunContext) {
        (self.0)(ctx).await
    }
}

/// Build a [`Workload`] from a closure.
///
/// The closure borrows the context for the duration of the returned future, so it
/// has to box it:
///
/// ```rust
/// use benchrun::from_fn;
///
/// let workload = from_fn(|ctx| {
///     Box::pin(async move {
///         ctx.incr("calls", 1);
///     })
/// });
/// # let _ = workload;
/// ```
pub fn from_fn<F>(f: F) -> FnWorkload<F>
where
    F: for<'a> Fn(&'a mut RunContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    FnWorkload(f)
}

/// Workload that only reports how long each call took. See [`timed`].
pub struct TimedWorkload<F>(F);

#[async_trait]
impl<F, Fut> Workload for TimedWorkload<F>
where
    F: Fn(usize, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Duration> + Send + 'static,
{
    async fn call(&self, ctx: &mut RunContext) {
        let elapsed = (self.0)(ctx.id(), ctx.iteration()).await;
        ctx.record_time(elapsed);
    }
}

/// Build a [`Workload`] from a function of `(worker_id, iteration)` returning the
/// elapsed time of the call. Samples land in [`crate::DEFAULT_TIMER`].
pub fn timed<F, Fut>(f: F) -> TimedWorkload<F>
where
    F: Fn(usize, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Duration> + Send + 'static,
{
    TimedWorkload(f)
}
