//! Training metrics collection.
//!
//! Provides structured logging and counters for monitoring run progress and
//! numeric health.

use edgeswarm_data::GenerationStats;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Metrics collector shared by the evolution loop.
pub struct Metrics {
    generation_count: AtomicU64,
    tick_count: AtomicU64,
    numeric_faults: AtomicU64,
    pub counters: Mutex<HashMap<String, AtomicU64>>,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation_count: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            numeric_faults: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records a scored generation.
    pub fn record_generation(&self, stats: &GenerationStats, ticks: u64, duration: Duration) {
        self.generation_count.fetch_add(1, Ordering::Relaxed);
        self.tick_count.fetch_add(ticks, Ordering::Relaxed);
        self.numeric_faults
            .fetch_add(stats.numeric_faults, Ordering::Relaxed);

        tracing::info!(
            generation = stats.generation,
            best = stats.best,
            mean = stats.mean,
            worst = stats.worst,
            std_dev = stats.std_dev,
            mutation_rate = stats.mutation_rate,
            duration_ms = duration.as_millis() as u64,
            "Generation scored"
        );
        if stats.numeric_faults > 0 || stats.evaluation_failures > 0 {
            tracing::warn!(
                generation = stats.generation,
                numeric_faults = stats.numeric_faults,
                evaluation_failures = stats.evaluation_failures,
                "Numeric faults recovered during generation"
            );
        }
    }

    /// Increments a named counter.
    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    pub fn add_to_counter(&self, name: &str, amount: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn generation_count(&self) -> u64 {
        self.generation_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn numeric_faults(&self) -> u64 {
        self.numeric_faults.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Installs a global `tracing` subscriber honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.generation_count(), 0);
        assert_eq!(metrics.tick_count(), 0);
    }

    #[test]
    fn test_record_generation() {
        let metrics = Metrics::new();
        let mut stats = GenerationStats::from_fitness(0, &[1.0, 2.0], 0.05).unwrap();
        stats.numeric_faults = 3;
        metrics.record_generation(&stats, 100, Duration::from_millis(5));
        assert_eq!(metrics.generation_count(), 1);
        assert_eq!(metrics.tick_count(), 100);
        assert_eq!(metrics.numeric_faults(), 3);
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.increment_counter("checkpoints");
        metrics.add_to_counter("checkpoints", 2);
        assert_eq!(metrics.counter("checkpoints"), 3);
        assert_eq!(metrics.counter("missing"), 0);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
