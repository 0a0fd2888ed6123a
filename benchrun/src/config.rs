use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::BenchError;

fn default_name() -> String {
    String::from("bench")
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

/// Immutable parameters of one benchmark run.
///
/// Build it with [`BenchConfig::builder`] or deserialize it; either way it is
/// validated by [`crate::Bench::new`].
///
/// ```rust
/// use benchrun::BenchConfig;
/// use std::time::Duration;
///
/// let config = BenchConfig::builder()
///     .name("checkout")
///     .concurrency(8)
///     .duration(Duration::from_secs(30))
///     .rate(200)
///     .build();
/// assert_eq!(config.target_rate(), Some(200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct BenchConfig {
    /// Label used in logs and reports.
    #[builder(default = default_name(), setter(into))]
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of parallel workers. Defaults to the number of CPUs.
    #[builder(default = default_concurrency())]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock budget of the run.
    pub duration: Duration,
    /// Calls per second across all workers. `None` or `Some(0)` runs
    /// continuously, as fast as the workload allows.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub rate: Option<u32>,
}

impl BenchConfig {
    /// The rate limit, if any.
    pub fn target_rate(&self) -> Option<u32> {
        self.rate.filter(|rate| *rate > 0)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.concurrency == 0 {
            return Err(BenchError::InvalidConcurrency(self.concurrency));
        }
        if self.duration.is_zero() {
            return Err(BenchError::InvalidDuration);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = BenchConfig::builder()
            .duration(Duration::from_secs(1))
            .build();
        assert_eq!(config.name, "bench");
        assert_eq!(config.concurrency, num_cpus::get());
        assert_eq!(config.target_rate(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rate_is_continuous() {
        let config = BenchConfig::builder()
            .duration(Duration::from_secs(1))
            .rate(0)
            .build();
        assert_eq!(config.target_rate(), None);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = BenchConfig::builder()
            .concurrency(0)
            .duration(Duration::from_secs(1))
            .build();
        assert!(matches!(
            config.validate(),
            Err(BenchError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn rejects_zero_duration() {
        let config = BenchConfig::builder()
            .concurrency(1)
            .duration(Duration::ZERO)
            .build();
        assert!(matches!(config.validate(), Err(BenchError::InvalidDuration)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: BenchConfig =
            serde_json::from_str(r#"{"duration": {"secs": 5, "nanos": 0}, "rate": 50}"#).unwrap();
        assert_eq!(config.duration, Duration::from_secs(5));
        assert_eq!(config.target_rate(), Some(50));
        assert_eq!(config.name, "bench");
        assert_eq!(config.concurrency, num_cpus::get());
    }
}
