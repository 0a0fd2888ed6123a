use crate::context::RunContext;
use crate::error::BenchError;
use crate::metric::Metrics;

/// Process-wide totals folded from every worker's [`RunContext`].
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Timers merged by name, counters summed by name.
    pub metrics: Metrics,
    /// Sum of every worker's final iteration.
    pub total_calls: u64,
}

/// Fold all worker contexts into one [`Aggregate`].
///
/// Every context's [`Metrics`] is merged into an empty accumulator: timers by
/// name, counters summed by name. A name need not appear in every context, and a
/// counter no worker touched does not appear in the result. Merging is
/// associative and commutative, so the result does not depend on worker order.
///
/// Must only be called once every worker has stopped: the contexts are read
/// without synchronization.
pub fn aggregate(contexts: &[RunContext]) -> Result<Aggregate, BenchError> {
    let mut metrics = Metrics::new();
    for ctx in contexts {
        metrics.merge(ctx.metrics())?;
    }
    let total_calls = contexts.iter().map(RunContext::iteration).sum();

    Ok(Aggregate {
        metrics,
        total_calls,
    })
}
