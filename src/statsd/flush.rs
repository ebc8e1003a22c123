//! Flush engine: materializes the raw store into derived statistics.

use std::collections::BTreeMap;
use std::fmt;

use super::store::RawStore;
use super::tick::{self, Tick};

/// Derived statistics for a single timer metric over one flush window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerData {
    /// Number of samples in the window.
    pub count: usize,
    /// Smallest sample.
    pub min: i64,
    /// Largest sample.
    pub max: i64,
    /// Sum of all samples.
    pub sum: i64,
    /// Arithmetic mean of the samples.
    pub avg: f64,
    /// Standard deviation of the samples.
    pub stddev: f64,
}

impl fmt::Display for TimerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cnt: {}, min: {}, max: {}, sum: {}, avg: {:.2}, stddev: {:.2}",
            self.count, self.min, self.max, self.sum, self.avg, self.stddev
        )
    }
}

/// The immutable aggregated view emitted at a flush boundary.
///
/// Counters are reported as per-second rates over the flush window;
/// gauges are copied verbatim; timers carry their window statistics.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Tick at the moment the snapshot was taken.
    pub timestamp: Tick,
    /// Counter rates, in events per second.
    pub counters: BTreeMap<String, f64>,
    /// Gauge values.
    pub gauges: BTreeMap<String, i64>,
    /// Timer statistics.
    pub timers: BTreeMap<String, TimerData>,
}

/// Computes window statistics for one timer's sample sequence.
///
/// The variance comes from `E[X²] − E[X]²`, clamped at zero before the
/// square root: near-constant samples can land an epsilon below zero in
/// floating point, and a NaN stddev would poison every downstream
/// comparison.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn process_timer(samples: &[i64]) -> TimerData {
    let mut data = TimerData { count: samples.len(), ..TimerData::default() };
    if data.count == 0 {
        return data;
    }

    data.min = i64::MAX;
    data.max = i64::MIN;
    let mut square_sum = 0.0_f64;
    for &v in samples {
        data.min = data.min.min(v);
        data.max = data.max.max(v);
        data.sum += v;
        square_sum += (v as f64) * (v as f64);
    }

    let n = data.count as f64;
    data.avg = data.sum as f64 / n;
    let var = square_sum / n - data.avg * data.avg;
    data.stddev = var.max(0.0).sqrt();
    data
}

/// Drains the raw store and produces the flush snapshot.
///
/// Counters and timers leave the store; gauges are copied and retained.
/// Timers with no samples in the window emit no entry.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn flush_metrics(store: &mut RawStore, period_ms: u64) -> Stats {
    let timestamp = tick::now();
    let period_s = period_ms as f64 / 1000.0;

    let (counters, timers) = store.drain();

    Stats {
        timestamp,
        counters: counters
            .into_iter()
            .map(|(name, sum)| (name, sum as f64 / period_s))
            .collect(),
        gauges: store.gauges.clone(),
        timers: timers
            .into_iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(name, samples)| (name, process_timer(&samples)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statsd::{builtin, MetricEvent, MetricKind};

    fn apply(store: &mut RawStore, name: &str, value: i64, kind: MetricKind) {
        store.apply(MetricEvent { name: name.to_owned(), value, kind });
    }

    #[test]
    fn test_counter_rate_normalization() {
        let mut store = RawStore::default();
        apply(&mut store, "app.hits", 5, MetricKind::Counter);
        apply(&mut store, "app.hits", 3, MetricKind::Counter);

        let stats = flush_metrics(&mut store, 1000);
        assert_eq!(stats.counters.get("app.hits"), Some(&8.0));

        // a 2 s window halves the rate
        let mut store = RawStore::default();
        apply(&mut store, "app.hits", 8, MetricKind::Counter);
        let stats = flush_metrics(&mut store, 2000);
        assert_eq!(stats.counters.get("app.hits"), Some(&4.0));
    }

    #[test]
    fn test_timer_statistics() {
        let data = process_timer(&[10, 20, 30, 40, 50]);
        assert_eq!(data.count, 5);
        assert_eq!(data.min, 10);
        assert_eq!(data.max, 50);
        assert_eq!(data.sum, 150);
        assert!((data.avg - 30.0).abs() < f64::EPSILON);
        assert!((data.stddev - 14.142_135_623_730_951).abs() < 1e-9);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_timer_bounds_hold() {
        for samples in [vec![7], vec![-5, 5], vec![1, 2, 3, 1000]] {
            let data = process_timer(&samples);
            assert!(data.min as f64 <= data.avg);
            assert!(data.avg <= data.max as f64);
            assert!(data.stddev >= 0.0);
            assert_eq!(data.sum, samples.iter().sum::<i64>());
        }
    }

    #[test]
    fn test_constant_samples_have_zero_stddev() {
        // E[X²] − E[X]² can dip below zero in floating point; the clamp
        // keeps the square root real
        let data = process_timer(&[1_000_000_007; 9]);
        assert_eq!(data.stddev, 0.0);
    }

    #[test]
    fn test_gauges_survive_flush() {
        let mut store = RawStore::default();
        apply(&mut store, "q", 13, MetricKind::Gauge);

        let first = flush_metrics(&mut store, 1000);
        assert_eq!(first.gauges.get("q"), Some(&13));

        // nothing arrives in the next window
        let second = flush_metrics(&mut store, 1000);
        assert_eq!(second.gauges.get("q"), Some(&13));
        assert!(second.counters.is_empty());
        assert!(second.timers.is_empty());
    }

    #[test]
    fn test_internal_count_rate() {
        let mut store = RawStore::default();
        apply(&mut store, "a", 1, MetricKind::Counter);
        apply(&mut store, "b", 1, MetricKind::Counter);

        let stats = flush_metrics(&mut store, 1000);
        assert_eq!(stats.counters.get(builtin::METRICS_COUNT), Some(&2.0));
    }

    #[test]
    fn test_timer_data_display() {
        let data = process_timer(&[10, 20, 30, 40, 50]);
        assert_eq!(
            data.to_string(),
            "cnt: 5, min: 10, max: 50, sum: 150, avg: 30.00, stddev: 14.14"
        );
    }
}
