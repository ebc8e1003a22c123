pub mod backends;
pub mod client;
pub mod codec;
pub mod flush;
mod macros;
pub mod server;
pub mod store;

/// The closed set of metric kinds carried by the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Additively accumulated; reported at flush as a per-second rate.
    Counter,
    /// Last-writer-wins absolute value; carried across flush windows.
    Gauge,
    /// Signed increment applied to the current gauge value.
    GaugeDelta,
    /// One sample appended to the metric's window sample vector.
    Histogram,
}

/// One decoded metric datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    /// Metric name, kept verbatim from the wire.
    pub name: String,
    /// Signed value. Malformed values decode as 0.
    pub value: i64,
    /// Which kind of metric this event updates.
    pub kind: MetricKind,
}

/// Built-in metrics maintained by the server itself.
pub mod builtin {
    /// Counter bumped once for every accepted datagram.
    pub const METRICS_COUNT: &str = "metrics.internal.count";
    /// Gauge holding the tick of the most recently accepted datagram.
    pub const METRICS_LAST_SEEN: &str = "metrics.internal.last_seen";
}

/// Monotonic millisecond clock shared by the whole pipeline.
///
/// Ticks count from a process-wide epoch captured on first use, so they
/// are comparable across threads but meaningless across processes.
pub mod tick {
    use std::sync::OnceLock;
    use std::time::Instant;

    /// A point in time, in milliseconds since the process epoch.
    pub type Tick = i64;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    /// Returns the current tick.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn now() -> Tick {
        EPOCH.get_or_init(Instant::now).elapsed().as_millis() as Tick
    }

    /// Milliseconds elapsed since `when`.
    #[must_use]
    pub fn since(when: Tick) -> i64 {
        now() - when
    }

    /// Renders a tick as a local-time ISO-8601 string with millisecond
    /// precision, e.g. `2016-03-01T14:05:22.118`.
    ///
    /// The wall-clock time is derived from the tick's distance to now, so
    /// ticks far in the past drift with any wall-clock adjustments made
    /// in between.
    #[must_use]
    pub fn to_local_string(when: Tick) -> String {
        let behind = chrono::Duration::milliseconds(since(when));
        let wall = chrono::Local::now() - behind;
        wall.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }

}
