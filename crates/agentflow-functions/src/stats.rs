//! Call statistics.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time copy of the engine's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionStatistics {
    pub total_registered_functions: usize,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub active_extensions: usize,
    /// Running mean over every recorded completion
    pub average_execution_time_ms: f64,
    /// Percentage in `0..=100`; 0 when no calls were recorded
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successes: u64,
    failures: u64,
    mean_ms: f64,
}

/// Incremental completion counters.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    counters: Mutex<Counters>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call.
    pub fn record_completion(&self, success: bool, elapsed: Duration) {
        let latest = elapsed.as_secs_f64() * 1000.0;
        let mut c = self.counters.lock();
        c.total += 1;
        if success {
            c.successes += 1;
        } else {
            c.failures += 1;
        }
        let n = c.total as f64;
        c.mean_ms = (c.mean_ms * (n - 1.0) + latest) / n;
    }

    /// Counters with derived success rate. Registry-derived fields are zero.
    pub fn snapshot(&self) -> FunctionStatistics {
        let c = self.counters.lock();
        let success_rate = if c.total == 0 {
            0.0
        } else {
            c.successes as f64 / c.total as f64 * 100.0
        };
        FunctionStatistics {
            total_registered_functions: 0,
            total_calls: c.total,
            successful_calls: c.successes,
            failed_calls: c.failures,
            active_extensions: 0,
            average_execution_time_ms: c.mean_ms,
            success_rate,
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let stats = StatisticsAggregator::new().snapshot();
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_execution_time_ms, 0.0);
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let agg = StatisticsAggregator::new();
        let samples = [10u64, 20, 45, 5, 70];
        for (i, ms) in samples.iter().enumerate() {
            agg.record_completion(i % 2 == 0, Duration::from_millis(*ms));
        }

        let stats = agg.snapshot();
        let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
        assert!((stats.average_execution_time_ms - mean).abs() < 1e-9);
        assert_eq!(stats.total_calls, 5);
        assert_eq!(stats.successful_calls, 3);
        assert_eq!(stats.failed_calls, 2);
        assert!((stats.success_rate - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let agg = StatisticsAggregator::new();
        agg.record_completion(true, Duration::from_millis(3));
        agg.reset();
        assert_eq!(agg.snapshot(), FunctionStatistics::default());
    }
}
