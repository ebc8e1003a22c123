//! # stout
//!
//! A self-contained load-testing and monitoring harness built around a
//! statsd-style metrics pipeline.
//!
//! ## Features
//!
//! - **UDP ingestion server**: single-threaded, lossy by design, with a
//!   periodic flush that materializes raw metrics into derived statistics
//! - **Fire-and-forget emitter**: counters, gauges, gauge deltas and
//!   timers from any producer thread
//! - **Pluggable backends**: console, plain-text file, JSON file, or any
//!   closure taking a snapshot
//! - **Baseline watches**: declarative assertions that compare each flush
//!   against a captured baseline and flag regressions
//!
//! ## Quick Start
//!
//! ```no_run
//! use stout::{ConsoleBackend, Server, ServerConfig};
//!
//! # fn main() -> stout::MetricResult<()> {
//! // server side: listen on UDP 9999, flush every 10 s to the console
//! let cfg = ServerConfig::new(9999)
//!     .flush_every(10)?
//!     .pre_flush(|| tracing::debug!("flushing"))
//!     .add_backend(ConsoleBackend);
//! let server = Server::run(cfg)?;
//!
//! // producer side: resolve the server once, then emit from anywhere
//! stout::setup_client("127.0.0.1", 9999).namespace("myapp").install()?;
//! stout::inc("requests.total");
//! stout::measure("request.duration", 42);
//! stout::set("queue.size", 10);
//! stout::set_delta("queue.size", -2);
//!
//! server.stop();
//! server.join();
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

// https://github.com/statsd/statsd/blob/master/docs/metric_types.md
mod config;
mod error;
mod monitor;
mod statsd;

pub use config::{ErrorReaction, HarnessConfig, ProcessSpec};
pub use error::MetricsError;
pub use monitor::{MonitoringBackend, ValueKind, Watch, WatchModel, WatchOp};
pub use statsd::backends::{
    ConsoleBackend, FileBackend, JsonFileBackend, StatsBackendTrait,
};
pub use statsd::client::{
    inc, inc_by, measure, set, set_delta, setup_client, AutoTimer, ClientConfig,
};
pub use statsd::codec::{
    format_counter, format_gauge, format_gauge_delta, format_histogram, parse,
};
pub use statsd::flush::{Stats, TimerData};
pub use statsd::server::{Server, ServerConfig, ServerEvent, DEFAULT_PORT};
pub use statsd::{builtin, tick, MetricEvent, MetricKind};

/// Result type for metrics operations.
///
/// Wraps errors that can occur during client setup, server configuration
/// and backend I/O.
pub type MetricResult<T> = Result<T, MetricsError>;
