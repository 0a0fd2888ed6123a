use hdrhistogram::{AdditionError, CreationError};
use thiserror::Error;

/// Errors surfaced by the engine itself.
///
/// Failures inside a [`crate::Workload`] are never reported here; a workload that
/// wants its failures to be visible records them with a counter.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("duration must be greater than zero")]
    InvalidDuration,

    #[error("failed to create latency histogram: {0:?}")]
    Histogram(CreationError),

    #[error("failed to merge latency histograms: {0:?}")]
    Merge(AdditionError),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
