//! Wire codec for the line-oriented datagram format `NAME:VALUE|TYPE`.
//!
//! Inbound parsing splits at the **last** `|` and the **last** `:` in the
//! buffer, so metric names may contain both characters as long as the
//! datagram still ends in a well-formed `:VALUE|TYPE` tail. Outbound
//! formatting produces the same four shapes the parser accepts.

use crate::MetricResult;

use super::{MetricEvent, MetricKind};

/// Maximum outbound packet size in bytes, including the terminator.
pub const MAX_PACKET: usize = 256;

/// Decodes one datagram payload into a [`MetricEvent`].
///
/// Recognized type suffixes are `c` (counter), `g` (gauge, or gauge
/// delta when the value starts with `+` or `-`) and `h`/`ms`
/// (histogram). Values are parsed as base-10 signed integers; a value
/// with no leading digits decodes as 0 rather than failing, matching
/// the lossy posture of the transport.
///
/// # Errors
///
/// Returns an error when either delimiter is missing or the type suffix
/// is not recognized. Callers are expected to log and discard.
pub fn parse(buf: &[u8]) -> MetricResult<MetricEvent> {
    let pipe = buf.iter().rposition(|&b| b == b'|');
    let colon = buf.iter().rposition(|&b| b == b':');
    let (Some(pipe), Some(colon)) = (pipe, colon) else {
        return Err(format!("unknown metric: {}", String::from_utf8_lossy(buf)).into());
    };

    // The type suffix runs from the last '|' to the end of the buffer,
    // so on the accepting paths below the last ':' precedes the '|'.
    let kind = match &buf[pipe..] {
        b"|c" => MetricKind::Counter,
        b"|h" | b"|ms" => MetricKind::Histogram,
        b"|g" => match buf.get(colon + 1) {
            Some(b'+' | b'-') => MetricKind::GaugeDelta,
            _ => MetricKind::Gauge,
        },
        tail => {
            return Err(
                format!("unknown metric type: {}", String::from_utf8_lossy(tail)).into(),
            );
        }
    };

    Ok(MetricEvent {
        name: String::from_utf8_lossy(&buf[..colon]).into_owned(),
        value: parse_value(&buf[colon + 1..pipe]),
        kind,
    })
}

/// Base-10 integer parsing with C `atol` semantics: optional sign, then
/// the longest leading run of digits. Anything else yields 0.
fn parse_value(bytes: &[u8]) -> i64 {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(b - b'0'));
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Formats a counter datagram, e.g. `app.hits:5|c`.
#[must_use]
pub fn format_counter(name: &str, value: i64) -> String {
    format_metric(name, value, "c", false)
}

/// Formats a histogram datagram, e.g. `app.latency:42|ms`.
#[must_use]
pub fn format_histogram(name: &str, value: i64) -> String {
    format_metric(name, value, "ms", false)
}

/// Formats an absolute gauge datagram, e.g. `queue.size:10|g`.
#[must_use]
pub fn format_gauge(name: &str, value: i64) -> String {
    format_metric(name, value, "g", false)
}

/// Formats a gauge-delta datagram with the sign always emitted, e.g.
/// `queue.size:+5|g` or `queue.size:-2|g`.
#[must_use]
pub fn format_gauge_delta(name: &str, value: i64) -> String {
    format_metric(name, value, "g", true)
}

fn format_metric(name: &str, value: i64, suffix: &str, signed: bool) -> String {
    let mut buffer = itoa::Buffer::new();
    let digits = buffer.format(value);

    let mut out = String::with_capacity(name.len() + digits.len() + suffix.len() + 3);
    out.push_str(name);
    out.push(':');
    if signed && value >= 0 {
        out.push('+');
    }
    out.push_str(digits);
    out.push('|');
    out.push_str(suffix);
    out
}
