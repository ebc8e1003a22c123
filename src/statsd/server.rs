//! Single-threaded UDP ingestion server with periodic flushes.
//!
//! One dedicated thread owns the socket and the raw store, applies
//! datagrams in arrival order, and drives flushes plus backend fan-out
//! sequentially. Producers never touch any of this state.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::MetricsError;
use crate::MetricResult;

use super::backends::StatsBackendTrait;
use super::codec;
use super::flush::{flush_metrics, Stats};
use super::store::RawStore;
use super::tick;

/// The default server port.
pub const DEFAULT_PORT: u16 = 9999;

/// Receive buffer size; datagrams of this size or larger are discarded.
const RECV_BUF_SIZE: usize = 4096;

/// How long one loop iteration waits for a datagram. This bounds how
/// late a flush can fire under zero traffic.
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Events the server broadcasts to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// An error occurred during server startup; the loop never ran.
    StartupFailed,
    /// The socket is bound and the loop is processing datagrams.
    Started,
    /// The server was stopped gracefully via the `stop` datagram.
    Stopped,
}

type FlushFn = Box<dyn FnMut() + Send>;
type ListenerFn = Box<dyn Fn(ServerEvent) + Send>;

/// Settings for a local in-process server instance.
///
/// # Example
///
/// ```no_run
/// use stout::{ConsoleBackend, FileBackend, Server, ServerConfig};
///
/// # fn main() -> stout::MetricResult<()> {
/// let cfg = ServerConfig::new(9999)
///     .flush_every(10)?                          // flush every 10 seconds
///     .add_backend(ConsoleBackend)               // dump stats to console
///     .add_backend(FileBackend::new("statsd.data"))
///     .add_server_listener(|event| println!("{event:?}"));
/// let server = Server::run(cfg)?;
/// # Ok(())
/// # }
/// ```
pub struct ServerConfig {
    port: u16,
    flush_period_ms: u64,
    pre_flush: FlushFn,
    listeners: Vec<ListenerFn>,
    backends: Vec<Box<dyn StatsBackendTrait + Send>>,
}

impl ServerConfig {
    /// Creates a configuration listening on `port`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            flush_period_ms: 60_000,
            pre_flush: Box::new(|| {}),
            listeners: Vec::new(),
            backends: Vec::new(),
        }
    }

    /// Sets the flush period. The default is 60 s.
    ///
    /// # Errors
    ///
    /// Returns a config error unless `period_s` is within `[1, 3600]`.
    pub fn flush_every(mut self, period_s: u64) -> MetricResult<Self> {
        if !(1..=3600).contains(&period_s) {
            return Err(MetricsError::Config(
                "valid flush period is 1-3600 s".to_owned(),
            ));
        }
        self.flush_period_ms = period_s * 1000;
        Ok(self)
    }

    /// Registers a callback invoked immediately before every flush. The
    /// default is a no-op. Useful for recording last-moment metrics.
    #[must_use]
    pub fn pre_flush(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.pre_flush = Box::new(callback);
        self
    }

    /// Registers a backend. Backends receive every flush snapshot in
    /// registration order.
    #[must_use]
    pub fn add_backend(mut self, backend: impl StatsBackendTrait + Send + 'static) -> Self {
        self.backends.push(Box::new(backend));
        self
    }

    /// Registers a plain closure as a backend.
    ///
    /// # Example
    ///
    /// ```
    /// use stout::ServerConfig;
    ///
    /// let cfg = ServerConfig::new(9999)
    ///     .add_backend_fn(|stats| println!("{} timers", stats.timers.len()));
    /// ```
    #[must_use]
    pub fn add_backend_fn(self, callback: impl FnMut(&Stats) + Send + 'static) -> Self {
        self.add_backend(super::backends::FnBackend(callback))
    }

    /// Registers a listener for [`ServerEvent`] notifications. Multiple
    /// listeners are invoked in registration order.
    #[must_use]
    pub fn add_server_listener(
        mut self,
        callback: impl Fn(ServerEvent) + Send + 'static,
    ) -> Self {
        self.listeners.push(Box::new(callback));
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// A running server instance.
pub struct Server {
    port: u16,
    handle: JoinHandle<()>,
}

impl Server {
    /// Starts the ingestion loop on a dedicated thread.
    ///
    /// Startup failures past this point (socket creation, bind) are
    /// reported asynchronously as [`ServerEvent::StartupFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error when the server thread cannot be spawned.
    pub fn run(cfg: ServerConfig) -> MetricResult<Self> {
        let port = cfg.port;
        let handle = std::thread::Builder::new()
            .name("stout-metrics-server".to_owned())
            .spawn(move || serve(cfg))
            .map_err(MetricsError::StdIo)?;
        Ok(Self { port, handle })
    }

    /// Asks the server to stop by sending it the administrative `stop`
    /// datagram. Fire-and-forget: delivery shares the transport's lossy
    /// semantics.
    pub fn stop(&self) {
        debug!("sending stop cmd...");
        match UdpSocket::bind(("127.0.0.1", 0)) {
            Ok(socket) => {
                if let Err(err) = socket.send_to(b"stop", ("127.0.0.1", self.port)) {
                    debug!("sendto failed: {err}");
                }
            }
            Err(err) => debug!("cannot create stop socket: {err}"),
        }
    }

    /// Waits for the ingestion loop to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("server thread panicked");
        }
    }
}

fn notify(listeners: &[ListenerFn], event: ServerEvent) {
    for listener in listeners {
        listener(event);
    }
}

fn serve(mut cfg: ServerConfig) {
    let socket = match UdpSocket::bind(("0.0.0.0", cfg.port)) {
        Ok(socket) => socket,
        Err(err) => {
            error!("cannot bind server socket on port {}: {err}", cfg.port);
            notify(&cfg.listeners, ServerEvent::StartupFailed);
            return;
        }
    };
    if let Err(err) = socket.set_read_timeout(Some(POLL_TIMEOUT)) {
        error!("cannot set socket timeout: {err}");
        notify(&cfg.listeners, ServerEvent::StartupFailed);
        return;
    }

    info!("inproc server listening at port {}", cfg.port);

    let mut store = RawStore::default();
    let mut buf = [0_u8; RECV_BUF_SIZE];
    #[allow(clippy::cast_possible_wrap)]
    let flush_period = cfg.flush_period_ms as i64;
    let mut flush_anchor = tick::now();

    notify(&cfg.listeners, ServerEvent::Started);
    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) if len > 0 && len < RECV_BUF_SIZE => {
                let payload = &buf[..len];
                if payload == b"stop" {
                    debug!("received stop cmd, stopping server");
                    drop(socket);
                    notify(&cfg.listeners, ServerEvent::Stopped);
                    return;
                }
                match codec::parse(payload) {
                    Ok(event) => store.apply(event),
                    Err(err) => debug!("{err}"),
                }
            }
            Ok((len, _)) => debug!("discarding datagram of {len} bytes"),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => warn!("recvfrom failed: {err}"),
        }

        // checked on every iteration, datagram or not, so flushes still
        // happen under zero traffic
        if tick::since(flush_anchor) >= flush_period {
            flush_anchor = tick::now();
            (cfg.pre_flush)();
            let stats = flush_metrics(&mut store, cfg.flush_period_ms);
            for backend in &mut cfg.backends {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    backend.emit(&stats)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => error!("backend failed: {err}"),
                    Err(_) => error!("backend panicked"),
                }
            }
            debug!("flush took {} ms", tick::since(flush_anchor));
        }
    }
}
