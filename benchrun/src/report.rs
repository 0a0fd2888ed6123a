use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::io::Write;

use crate::bench::BenchResult;
use crate::error::BenchError;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Which percentiles a [`BenchReport`] lists for every timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Percentiles {
    /// Median, 99.9th and maximum.
    Basic,
    /// A wider profile from the 5th percentile to the maximum, plus the mean.
    #[default]
    Extended,
}

impl Percentiles {
    pub fn values(&self) -> &'static [f64] {
        match self {
            Percentiles::Basic => &[50.0, 99.9, 100.0],
            Percentiles::Extended => &[5.0, 50.0, 70.0, 90.0, 95.0, 99.0, 99.9, 99.95, 99.99, 100.0],
        }
    }
}

/// A single percentile of a timer, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub millis: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerReport {
    pub name: String,
    pub samples: u64,
    pub percentiles: Vec<PercentileValue>,
    /// Only present in the extended profile.
    pub mean_millis: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterReport {
    pub name: String,
    pub value: i64,
}

/// The processed form of a [`BenchResult`].
///
/// A report is pure data: percentiles are resolved and converted from nanoseconds
/// to milliseconds, timers and counters are sorted by name. It has no I/O of its
/// own; print it through its [`fmt::Display`] implementation or hand it to a
/// [`Reporter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub name: String,
    pub elapsed_secs: f64,
    pub concurrency: usize,
    pub rate: Option<u32>,
    pub total_calls: u64,
    pub timers: Vec<TimerReport>,
    pub counters: Vec<CounterReport>,
}

impl BenchReport {
    pub fn new(result: &BenchResult, profile: Percentiles) -> Self {
        let mut timers: Vec<TimerReport> = result
            .timers
            .iter()
            .map(|(name, histogram)| TimerReport {
                name: name.clone(),
                samples: histogram.len(),
                percentiles: profile
                    .values()
                    .iter()
                    .map(|p| PercentileValue {
                        percentile: *p,
                        millis: histogram.value_at_percentile(*p) as f64 / NANOS_PER_MILLI,
                    })
                    .collect(),
                mean_millis: (profile == Percentiles::Extended)
                    .then(|| histogram.mean() / NANOS_PER_MILLI),
            })
            .collect();
        timers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut counters: Vec<CounterReport> = result
            .counters
            .iter()
            .map(|(name, value)| CounterReport {
                name: name.clone(),
                value: *value,
            })
            .collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            name: result.name.clone(),
            elapsed_secs: result.elapsed.as_secs_f64(),
            concurrency: result.concurrency,
            rate: result.rate,
            total_calls: result.total_calls,
            timers,
            counters,
        }
    }
}

impl From<&BenchResult> for BenchReport {
    fn from(result: &BenchResult) -> Self {
        Self::new(result, Percentiles::Extended)
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = "  ";
        if let Some(rate) = self.rate {
            write!(f, "Rate: {rate} calls/sec, ")?;
        }
        writeln!(
            f,
            "Duration: {:.2}s, Concurrency: {}, Total runs: {}",
            self.elapsed_secs, self.concurrency, self.total_calls
        )?;

        for timer in &self.timers {
            writeln!(f, "{prefix}>>Timer: {}", timer.name)?;
            for p in &timer.percentiles {
                writeln!(
                    f,
                    "{prefix}{prefix}{:.2}th percentile: {:.2}ms",
                    p.percentile, p.millis
                )?;
            }
            if let Some(mean) = timer.mean_millis {
                writeln!(f, "{prefix}{prefix}Mean: {mean:.2}ms")?;
            }
        }
        for counter in &self.counters {
            writeln!(f, "{prefix}>>Counter: {}", counter.name)?;
            writeln!(f, "{prefix}{prefix}Value: {}", counter.value)?;
        }
        Ok(())
    }
}

/// A [`Reporter`] consumes a [`BenchReport`] and performs side effects: displaying
/// it, sending it to a service, or persisting it somewhere.
///
/// # Example
/// ```rust
/// use benchrun::{BenchError, BenchReport, Reporter};
///
/// struct CallsOnly;
///
/// impl Reporter for CallsOnly {
///     async fn report(&self, report: &BenchReport) -> Result<(), BenchError> {
///         println!("{} calls", report.total_calls);
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter {
    fn report(&self, report: &BenchReport) -> impl Future<Output = Result<(), BenchError>>;
}

/// Prints the text rendering of the report.
pub struct StdoutReporter;

impl StdoutReporter {
    fn write_to(&self, out: &mut impl Write, report: &BenchReport) -> Result<(), BenchError> {
        write!(out, "{report}")?;
        out.flush()?;
        Ok(())
    }
}

impl Reporter for StdoutReporter {
    async fn report(&self, report: &BenchReport) -> Result<(), BenchError> {
        self.write_to(&mut std::io::stdout().lock(), report)
    }
}

/// Prints the report as pretty JSON.
pub struct JsonReporter;

impl JsonReporter {
    fn write_to(&self, out: &mut impl Write, report: &BenchReport) -> Result<(), BenchError> {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

impl Reporter for JsonReporter {
    async fn report(&self, report: &BenchReport) -> Result<(), BenchError> {
        self.write_to(&mut std::io::stdout().lock(), report)
    }
}
