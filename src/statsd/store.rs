//! In-memory aggregation state for the current flush window.

use std::collections::BTreeMap;

use super::{builtin, tick, MetricEvent, MetricKind};

/// Raw metric values accumulated between two flushes.
///
/// The store is confined to the ingestion thread: it is created inside
/// the server loop, mutated only there, and drained at every flush
/// boundary. Sorted maps keep backend output deterministic.
#[derive(Debug, Default)]
pub struct RawStore {
    pub(crate) counters: BTreeMap<String, i64>,
    pub(crate) gauges: BTreeMap<String, i64>,
    pub(crate) timers: BTreeMap<String, Vec<i64>>,
}

impl RawStore {
    /// Applies one decoded event to the window, then updates the
    /// built-in bookkeeping metrics.
    pub fn apply(&mut self, event: MetricEvent) {
        let MetricEvent { name, value, kind } = event;
        match kind {
            MetricKind::Counter => {
                *self.counters.entry(name).or_insert(0) += value;
            }
            MetricKind::Gauge => {
                self.gauges.insert(name, value);
            }
            MetricKind::GaugeDelta => {
                *self.gauges.entry(name).or_insert(0) += value;
            }
            MetricKind::Histogram => {
                self.timers.entry(name).or_default().push(value);
            }
        }

        *self
            .counters
            .entry(builtin::METRICS_COUNT.to_owned())
            .or_insert(0) += 1;
        self.gauges
            .insert(builtin::METRICS_LAST_SEEN.to_owned(), tick::now());
    }

    /// Moves the window's counters and timers out, leaving both empty.
    /// Gauges are not drained; they carry over into the next window.
    pub fn drain(&mut self) -> (BTreeMap<String, i64>, BTreeMap<String, Vec<i64>>) {
        (
            std::mem::take(&mut self.counters),
            std::mem::take(&mut self.timers),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, value: i64, kind: MetricKind) -> MetricEvent {
        MetricEvent { name: name.to_owned(), value, kind }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut store = RawStore::default();
        store.apply(event("app.hits", 5, MetricKind::Counter));
        store.apply(event("app.hits", 3, MetricKind::Counter));
        assert_eq!(store.counters.get("app.hits"), Some(&8));
    }

    #[test]
    fn test_gauge_overwrites_and_delta_adds() {
        let mut store = RawStore::default();
        store.apply(event("q", 10, MetricKind::Gauge));
        store.apply(event("q", 99, MetricKind::Gauge));
        store.apply(event("q", 5, MetricKind::GaugeDelta));
        store.apply(event("q", -2, MetricKind::GaugeDelta));
        assert_eq!(store.gauges.get("q"), Some(&102));
    }

    #[test]
    fn test_delta_on_missing_gauge_starts_at_zero() {
        let mut store = RawStore::default();
        store.apply(event("q", -3, MetricKind::GaugeDelta));
        assert_eq!(store.gauges.get("q"), Some(&-3));
    }

    #[test]
    fn test_timers_keep_insertion_order() {
        let mut store = RawStore::default();
        for v in [30, 10, 20] {
            store.apply(event("lat", v, MetricKind::Histogram));
        }
        assert_eq!(store.timers.get("lat"), Some(&vec![30, 10, 20]));
    }

    #[test]
    fn test_builtins_track_every_event() {
        let mut store = RawStore::default();
        store.apply(event("a", 1, MetricKind::Counter));
        store.apply(event("b", 2, MetricKind::Gauge));
        store.apply(event("c", 3, MetricKind::Histogram));
        assert_eq!(store.counters.get(builtin::METRICS_COUNT), Some(&3));
        assert!(store.gauges.contains_key(builtin::METRICS_LAST_SEEN));
    }

    #[test]
    fn test_drain_empties_counters_and_timers_only() {
        let mut store = RawStore::default();
        store.apply(event("hits", 1, MetricKind::Counter));
        store.apply(event("lat", 7, MetricKind::Histogram));
        store.apply(event("q", 4, MetricKind::Gauge));

        let (counters, timers) = store.drain();
        assert_eq!(counters.get("hits"), Some(&1));
        assert_eq!(timers.get("lat"), Some(&vec![7]));

        assert!(store.counters.is_empty());
        assert!(store.timers.is_empty());
        assert_eq!(store.gauges.get("q"), Some(&4));
    }
}
