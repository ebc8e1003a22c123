//! Flush sinks: console, plain-text file, JSON file, plus the contract
//! they all implement.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use crate::MetricResult;

use super::flush::Stats;
use super::tick;

/// The contract every flush sink implements.
///
/// Backends are called once per flush with a shared reference to the
/// snapshot, in registration order, never concurrently with themselves.
/// They must not retain the reference past the call; state worth keeping
/// (a baseline, say) has to be copied out. A failing backend is logged
/// and never prevents later backends from running.
pub trait StatsBackendTrait {
    /// Processes one flush snapshot.
    ///
    /// # Errors
    ///
    /// Implementations surface I/O failures here; the server logs them
    /// and moves on.
    fn emit(&mut self, stats: &Stats) -> MetricResult<()>;
}

/// Adapter turning a plain closure into a backend; used by
/// [`crate::ServerConfig::add_backend_fn`].
pub(crate) struct FnBackend<F>(pub(crate) F);

impl<F> StatsBackendTrait for FnBackend<F>
where
    F: FnMut(&Stats),
{
    fn emit(&mut self, stats: &Stats) -> MetricResult<()> {
        (self.0)(stats);
        Ok(())
    }
}

/// Dumps each flush to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleBackend;

impl StatsBackendTrait for ConsoleBackend {
    fn emit(&mut self, stats: &Stats) -> MetricResult<()> {
        for (name, rate) in &stats.counters {
            println!(" C: {name} - {rate:.2} 1/s");
        }
        for (name, value) in &stats.gauges {
            println!(" G: {name} - {value}");
        }
        for (name, data) in &stats.timers {
            println!(" H: {name} - {data}");
        }
        Ok(())
    }
}

/// Appends each flush to a plain-text file.
///
/// The file is opened and closed per flush, so the backend never holds
/// a handle between windows.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Creates a backend appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatsBackendTrait for FileBackend {
    fn emit(&mut self, stats: &Stats) -> MetricResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "@ TS: {}", tick::to_local_string(stats.timestamp))?;
        for (name, rate) in &stats.counters {
            writeln!(file, " C: {name} - {rate:.2} 1/s")?;
        }
        for (name, value) in &stats.gauges {
            writeln!(file, " G: {name} - {value}")?;
        }
        for (name, data) in &stats.timers {
            writeln!(file, " H: {name} - {data}")?;
        }
        writeln!(file, "----------------------------------------------")?;
        Ok(())
    }
}

/// Appends each flush to a file as one standalone JSON object.
///
/// The resulting file is a sequence of top-level objects, one per
/// flush, not a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StatsBackendTrait for JsonFileBackend {
    #[allow(clippy::cast_precision_loss)]
    fn emit(&mut self, stats: &Stats) -> MetricResult<()> {
        const INDENT: &str = "    ";

        let mut out = String::with_capacity(256);
        out.push_str("{\n");
        out.push_str(INDENT);
        let _ = write!(
            out,
            "{}: {}",
            quote("_timestamp"),
            quote(&tick::to_local_string(stats.timestamp))
        );

        for (name, rate) in &stats.counters {
            let _ = write!(out, ",\n{INDENT}{}: {}", quote(name), format_double(*rate));
        }
        for (name, value) in &stats.gauges {
            let _ = write!(out, ",\n{INDENT}{}: {value}", quote(name));
        }
        for (name, data) in &stats.timers {
            let _ = write!(
                out,
                ",\n{INDENT}{}: {{ \"avg\": {}, \"count\": {}, \"min\": {}, \"max\": {}, \"stddev\": {} }}",
                quote(name),
                format_double(data.avg),
                data.count,
                format_double(data.min as f64),
                format_double(data.max as f64),
                format_double(data.stddev),
            );
        }
        out.push_str("\n}\n");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

/// JSON-quotes a string: short escapes for the usual suspects, `\uXXXX`
/// (uppercase, four digits) for the remaining control bytes.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c > '\0' && c <= '\u{1f}' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Formats an `f64` the way C's `%#.16g` would, then truncates trailing
/// zeros after the decimal point keeping exactly one (`1.0`, `30.0`,
/// `1.50`). Output in fixed notation always ends in a digit.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_double(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_owned();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let exp = value.abs().log10().floor() as i32;
    if (-4..16).contains(&exp) {
        let precision = (15 - exp).max(0) as usize;
        let mut text = format!("{value:.precision$}");
        if !text.contains('.') {
            text.push_str(".0");
        }
        truncate_zeros(&text)
    } else {
        // scientific notation keeps the full 15-digit mantissa
        let text = format!("{value:.15e}");
        match text.split_once('e') {
            Some((mantissa, exponent)) => {
                let exp_val: i32 = exponent.parse().unwrap_or(0);
                let sign = if exp_val < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp_val.abs())
            }
            None => text,
        }
    }
}

fn truncate_zeros(text: &str) -> String {
    if !text.ends_with('0') {
        return text.to_owned();
    }

    let bytes = text.as_bytes();
    let mut i = bytes.len() - 1;
    while i > 0 && bytes[i] == b'0' {
        i -= 1;
    }
    let last_nonzero = i;

    // only truncate when everything from here back to a '.' is digits;
    // an exponent marker means the zeros are load-bearing
    loop {
        match bytes[i] {
            b'.' => return text[..=last_nonzero + 1].to_owned(),
            b'0'..=b'9' => {
                if i == 0 {
                    return text.to_owned();
                }
                i -= 1;
            }
            _ => return text.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statsd::flush::TimerData;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_double_basics() {
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(30.0), "30.0");
        assert_eq!(format_double(1.5), "1.50");
        assert_eq!(format_double(0.5), "0.50");
        assert_eq!(format_double(-2.0), "-2.0");
        assert_eq!(format_double(8.0), "8.0");
    }

    #[test]
    fn test_format_double_keeps_significant_digits() {
        assert_eq!(format_double(14.142_135_623_730_951), "14.14213562373095");
        assert_eq!(format_double(0.1), "0.10");
        assert_eq!(format_double(123.456), "123.4560");
    }

    #[test]
    fn test_format_double_scientific() {
        assert_eq!(format_double(1e20), "1.000000000000000e+20");
        assert_eq!(format_double(1.5e-7), "1.500000000000000e-07");
    }

    #[test]
    fn test_format_double_round_trips() {
        for value in [0.0, 1.0, 8.0, 0.5, 30.0, 14.142_135_623_730_951, 123.456, 1e-3] {
            let text = format_double(value);
            let back: f64 = text.parse().unwrap();
            assert!((back - value).abs() <= f64::EPSILON * value.abs());
            assert!(text.matches('.').count() <= 1);
            assert!(text.ends_with(|c: char| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_quote_short_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote("a\nb\tc"), "\"a\\nb\\tc\"");
        assert_eq!(quote("\u{8}\u{c}\r"), "\"\\b\\f\\r\"");
    }

    #[test]
    fn test_quote_control_bytes_as_unicode_escapes() {
        assert_eq!(quote("\u{1}"), "\"\\u0001\"");
        assert_eq!(quote("\u{1f}"), "\"\\u001F\"");
    }

    fn sample_stats() -> Stats {
        let mut counters = BTreeMap::new();
        counters.insert("app.hits".to_owned(), 8.0);
        let mut gauges = BTreeMap::new();
        gauges.insert("queue.size".to_owned(), 13);
        let mut timers = BTreeMap::new();
        timers.insert(
            "lat".to_owned(),
            TimerData { count: 5, min: 10, max: 50, sum: 150, avg: 30.0, stddev: 14.0 },
        );
        Stats { timestamp: tick::now(), counters, gauges, timers }
    }

    #[test]
    fn test_file_backend_layout() {
        let path = std::env::temp_dir().join("stout-file-backend-test.data");
        let _ = std::fs::remove_file(&path);

        let mut backend = FileBackend::new(&path);
        backend.emit(&sample_stats()).unwrap();
        backend.emit(&sample_stats()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        // two flushes appended, each with header, lines and separator
        assert_eq!(text.matches("@ TS: ").count(), 2);
        assert_eq!(text.matches(" C: app.hits - 8.00 1/s\n").count(), 2);
        assert_eq!(text.matches(" G: queue.size - 13\n").count(), 2);
        assert_eq!(
            text.matches(" H: lat - cnt: 5, min: 10, max: 50, sum: 150, avg: 30.00, stddev: 14.00\n")
                .count(),
            2
        );
        assert_eq!(
            text.lines().filter(|line| line.starts_with("----")).count(),
            2
        );
    }

    #[test]
    fn test_json_backend_layout() {
        let path = std::env::temp_dir().join("stout-json-backend-test.data");
        let _ = std::fs::remove_file(&path);

        let mut backend = JsonFileBackend::new(&path);
        backend.emit(&sample_stats()).unwrap();
        backend.emit(&sample_stats()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        // one standalone object per flush
        assert_eq!(text.matches("{\n").count(), 2);
        assert_eq!(text.matches("\n}\n").count(), 2);
        assert_eq!(text.matches("\"_timestamp\": \"").count(), 2);
        assert!(text.contains("\"app.hits\": 8.0"));
        assert!(text.contains("\"queue.size\": 13"));
        assert!(text.contains(
            "\"lat\": { \"avg\": 30.0, \"count\": 5, \"min\": 10.0, \"max\": 50.0, \"stddev\": 14.0 }"
        ));
        // _timestamp comes first in every object
        for object in text.split("{\n").skip(1) {
            assert!(object.trim_start_matches(' ').starts_with("\"_timestamp\""));
        }
    }

    #[test]
    fn test_closure_backend() {
        let mut seen = 0;
        {
            let mut backend = FnBackend(|_stats: &Stats| {
                seen += 1;
            });
            backend.emit(&sample_stats()).unwrap();
            backend.emit(&sample_stats()).unwrap();
        }
        assert_eq!(seen, 2);
    }
}
