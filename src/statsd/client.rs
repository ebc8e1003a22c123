//! Producer-side emitter: fire-and-forget metric datagrams over UDP.
//!
//! The client is process-wide state written exactly once by
//! [`ClientConfig::install`] and read-only afterwards. Each producer
//! thread lazily binds its own send socket, so producers never share
//! mutable state with each other or with the server.

use std::cell::RefCell;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use crate::error::MetricsError;
use crate::MetricResult;

use super::codec::{self, MAX_PACKET};
use super::tick::{self, Tick};

struct ClientState {
    addr: SocketAddr,
    namespace: String,
}

static CLIENT: OnceLock<ClientState> = OnceLock::new();

thread_local! {
    static SEND_SOCKET: RefCell<Option<UdpSocket>> = const { RefCell::new(None) };
}

/// Starts building the producer-side configuration.
///
/// Nothing is resolved or stored until [`ClientConfig::install`] runs.
///
/// # Example
///
/// ```no_run
/// # fn main() -> stout::MetricResult<()> {
/// stout::setup_client("127.0.0.1", 9999)
///     .namespace("myapp")
///     .track_default_metrics(45)
///     .install()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn setup_client(server: &str, port: u16) -> ClientConfig {
    ClientConfig {
        server: server.to_owned(),
        port,
        namespace: "stats".to_owned(),
        defaults_period: None,
    }
}

/// Producer-side settings, installed process-wide by [`ClientConfig::install`].
pub struct ClientConfig {
    server: String,
    port: u16,
    namespace: String,
    defaults_period: Option<Duration>,
}

impl ClientConfig {
    /// Sets the namespace prepended to every metric name. The default
    /// is `stats`.
    #[must_use]
    pub fn namespace(mut self, ns: &str) -> Self {
        self.namespace = ns.to_owned();
        self
    }

    /// Emits a small set of process self-metrics (`proc.uptime` and, on
    /// Linux, `proc.mem.rss`) every `period_s` seconds from a background
    /// thread. A period of 0 is rejected by [`ClientConfig::install`].
    #[must_use]
    pub fn track_default_metrics(mut self, period_s: u64) -> Self {
        self.defaults_period = Some(Duration::from_secs(period_s));
        self
    }

    /// Resolves the server address once and installs the configuration
    /// process-wide.
    ///
    /// # Errors
    ///
    /// Returns a config error when the server name is empty, when it
    /// cannot be resolved, when the default-metrics period is 0, or when
    /// a client configuration was already installed. The configuration
    /// is write-once by design.
    pub fn install(self) -> MetricResult<()> {
        if self.server.is_empty() {
            return Err(MetricsError::Config(
                "specified server can't be an empty string".to_owned(),
            ));
        }
        if self.defaults_period == Some(Duration::ZERO) {
            return Err(MetricsError::Config(
                "default metrics period must be greater than 0".to_owned(),
            ));
        }

        let addr = (self.server.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| {
                MetricsError::Config(format!(
                    "could not obtain address of {}: {err}",
                    self.server
                ))
            })?
            .next()
            .ok_or_else(|| {
                MetricsError::Config(format!("no address found for {}", self.server))
            })?;

        let state = ClientState { addr, namespace: self.namespace };
        if CLIENT.set(state).is_err() {
            return Err(MetricsError::Config(
                "metrics client is already configured".to_owned(),
            ));
        }

        if let Some(period) = self.defaults_period {
            spawn_default_metrics(period);
        }
        Ok(())
    }
}

/// Increments a counter by one.
///
/// # Example
///
/// ```
/// stout::inc("app.logins");
/// ```
pub fn inc(metric: &str) {
    inc_by(metric, 1);
}

/// Increments a counter by `value`.
pub fn inc_by(metric: &str, value: i64) {
    signal(metric, value, codec::format_counter);
}

/// Records one timer/histogram sample.
///
/// # Example
///
/// ```
/// let started = std::time::Instant::now();
/// // ... do something lengthy ...
/// stout::measure("app.login.duration", started.elapsed().as_millis() as i64);
/// ```
pub fn measure(metric: &str, value: i64) {
    signal(metric, value, codec::format_histogram);
}

/// Sets a gauge to an absolute value.
pub fn set(metric: &str, value: i64) {
    signal(metric, value, codec::format_gauge);
}

/// Adds a signed delta to a gauge.
///
/// ```
/// stout::set("free_space", 3000);       // free_space => 3000
/// stout::set_delta("free_space", 100);  // free_space => 3100
/// stout::set_delta("free_space", -600); // free_space => 2500
/// ```
pub fn set_delta(metric: &str, value: i64) {
    signal(metric, value, codec::format_gauge_delta);
}

fn signal(metric: &str, value: i64, format: fn(&str, i64) -> String) {
    let Some(client) = CLIENT.get() else {
        debug!("metrics client not configured, dropping {metric}");
        return;
    };

    let mut name = String::with_capacity(client.namespace.len() + metric.len() + 1);
    name.push_str(&client.namespace);
    name.push('.');
    name.push_str(metric);

    let payload = format(&name, value);
    if payload.len() >= MAX_PACKET {
        debug!("metric {metric} didn't fit, dropping");
        return;
    }

    send_to_server(&payload, client.addr);
}

fn send_to_server(payload: &str, addr: SocketAddr) {
    SEND_SOCKET.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            match UdpSocket::bind(("0.0.0.0", 0)) {
                Ok(socket) => *slot = Some(socket),
                Err(err) => {
                    debug!("cannot create client socket: {err}");
                    return;
                }
            }
        }
        if let Some(socket) = slot.as_ref() {
            if let Err(err) = socket.send_to(payload.as_bytes(), addr) {
                debug!("sendto failed: {err}");
            }
        }
    });
}

fn spawn_default_metrics(period: Duration) {
    std::thread::spawn(move || loop {
        set("proc.uptime", tick::now());
        #[cfg(target_os = "linux")]
        if let Some(kb) = resident_set_kb() {
            set("proc.mem.rss", kb);
        }
        std::thread::sleep(period);
    });
}

/// Resident set size in KiB, read from procfs. Assumes 4 KiB pages.
#[cfg(target_os = "linux")]
fn resident_set_kb() -> Option<i64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: i64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4)
}

/// Measures the lifetime of a scope and records it as a timer metric.
///
/// The timer notes the current tick on construction and records the
/// elapsed milliseconds with [`measure`] when dropped.
///
/// # Example
///
/// ```
/// fn some_function() {
///     let _timer = stout::AutoTimer::new("app.fn.duration");
///     // ... do something lengthy ...
/// } // here, timer 'app.fn.duration' is recorded
/// ```
pub struct AutoTimer {
    metric: String,
    started_at: Tick,
}

impl AutoTimer {
    /// Starts a timer for `metric`.
    #[must_use]
    pub fn new(metric: impl Into<String>) -> Self {
        Self { metric: metric.into(), started_at: tick::now() }
    }
}

impl Drop for AutoTimer {
    fn drop(&mut self) {
        measure(&self.metric, tick::since(self.started_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the process-wide client stays uninstalled in unit tests; emitting
    // without it must be a silent no-op

    #[test]
    fn test_emit_without_client_is_a_noop() {
        inc("unit.hits");
        measure("unit.lat", 5);
        set("unit.q", 1);
        set_delta("unit.q", -1);
    }

    #[test]
    fn test_auto_timer_drop_without_client() {
        let timer = AutoTimer::new("unit.scope");
        drop(timer);
    }

    #[test]
    fn test_install_rejects_empty_server() {
        let result = setup_client("", 9999).install();
        assert!(matches!(result, Err(MetricsError::Config(_))));
    }

    #[test]
    fn test_install_rejects_zero_defaults_period() {
        let result = setup_client("127.0.0.1", 9999)
            .track_default_metrics(0)
            .install();
        assert!(matches!(result, Err(MetricsError::Config(_))));
    }
}
