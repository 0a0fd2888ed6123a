use hdrhistogram::Histogram;

use crate::error::BenchError;

/// Lowest discernible latency, in nanoseconds.
pub const LOWEST_TRACKABLE: u64 = 1;
/// One hour in nanoseconds. Larger samples are clamped to this value.
pub const HIGHEST_TRACKABLE: u64 = 3_600_000_000_000;
/// Number of significant decimal digits kept for every sample.
pub const SIGNIFICANT_FIGURES: u8 = 3;

/// A latency distribution in nanoseconds.
///
/// Thin adapter over [`hdrhistogram::Histogram`] exposing only what the engine
/// needs: recording, merging and quantile/mean queries. Every instance shares the
/// same bounds so merging two of them never has to resize.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self, BenchError> {
        let inner =
            Histogram::new_with_bounds(LOWEST_TRACKABLE, HIGHEST_TRACKABLE, SIGNIFICANT_FIGURES)
                .map_err(BenchError::Histogram)?;
        Ok(Self { inner })
    }

    /// Record a sample. Values above the highest trackable value are clamped
    /// instead of rejected.
    pub fn record(&mut self, nanos: u64) {
        self.inner.saturating_record(nanos);
    }

    /// Fold every sample recorded in `other` into `self`.
    ///
    /// Merging is associative and commutative: the resulting distribution does not
    /// depend on the order in which histograms are merged.
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<(), BenchError> {
        self.inner.add(&other.inner).map_err(BenchError::Merge)
    }

    /// Value at the given percentile, `0.0..=100.0`.
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        self.inner.value_at_percentile(percentile)
    }

    pub fn mean(&self) -> f64 {
        self.inner.mean()
    }

    pub fn min(&self) -> u64 {
        self.inner.min()
    }

    pub fn max(&self) -> u64 {
        self.inner.max()
    }

    /// Number of recorded samples.
    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        // the bounds are constants, creation cannot fail for them
        Self::new().expect("latency histogram bounds are valid")
    }
}
