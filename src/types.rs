//! Core data types for LasecPlot
//!
//! This module contains the small value types shared by the protocol parsers,
//! the channel registry and the session.
//!
//! # Main Types
//!
//! - [`TelemetryKind`] - Closed set of channel kinds (number, text, xy, 3D)
//! - [`CurrentValue`] - The latest value(s) of a channel, shown without waiting for a tick
//! - [`LogEntry`] - A timestamped log line
//! - [`Origin`] - Which transport delivered a payload
//! - [`IngestStats`] - Counters about received and rejected input
//!
//! # Timestamps
//!
//! All timestamps handled by the core are wall-clock seconds (fractional),
//! converted from the milliseconds used on the wire.

use serde::{Deserialize, Serialize};

use crate::protocol::shape::ShapeState;

/// Kind of data a channel holds. Fixed by the first line seen for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryKind {
    /// Floating point samples over time
    Number,
    /// Text samples over time
    Text,
    /// Coordinate pairs, with an auxiliary timestamp used for eviction
    Xy,
    /// 3D shape snapshots over time
    #[serde(rename = "3D")]
    Shape3d,
}

impl TelemetryKind {
    /// Whether the time axis of this kind lives in the auxiliary sequence
    pub fn is_xy(&self) -> bool {
        matches!(self, TelemetryKind::Xy)
    }
}

impl std::fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryKind::Number => write!(f, "number"),
            TelemetryKind::Text => write!(f, "text"),
            TelemetryKind::Xy => write!(f, "xy"),
            TelemetryKind::Shape3d => write!(f, "3D"),
        }
    }
}

/// Latest value(s) of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CurrentValue {
    Number(f64),
    Text(String),
    Xy { x: f64, y: f64 },
    #[serde(rename = "3D")]
    Shape(ShapeState),
}

impl CurrentValue {
    /// Render the value for a single-value display, with an optional unit
    pub fn format(&self, unit: &str) -> String {
        let body = match self {
            CurrentValue::Number(v) => format_number(*v),
            CurrentValue::Text(text) => text.clone(),
            CurrentValue::Xy { x, y } => format!("({}, {})", format_number(*x), format_number(*y)),
            CurrentValue::Shape(shape) => shape.kind.to_string(),
        };
        if unit.is_empty() {
            body
        } else {
            format!("{} {}", body, unit)
        }
    }
}

/// A log line received from a device or host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock seconds
    pub timestamp: f64,
    /// Log text, as received
    pub text: String,
}

impl LogEntry {
    pub fn new(timestamp: f64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// Transport a payload arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Origin {
    /// Datagram from a device on the network
    Udp,
    /// Bytes read from a serial port
    Serial,
    /// Host-side input (tests, replays of pre-framed records)
    #[default]
    Local,
}

impl Origin {
    /// Device payloads use the `>` variable prefix convention
    pub fn is_device(&self) -> bool {
        matches!(self, Origin::Udp | Origin::Serial)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Udp => write!(f, "UDP"),
            Origin::Serial => write!(f, "Serial"),
            Origin::Local => write!(f, "Local"),
        }
    }
}

/// Statistics about received input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Payloads handed to the session
    pub payloads: u64,
    /// Payloads discarded because the view was paused
    pub dropped_while_paused: u64,
    /// Non-empty records processed
    pub records: u64,
    /// Records rejected as a whole
    pub line_errors: u64,
    /// Value items skipped inside otherwise valid records
    pub item_errors: u64,
}

/// Convert wire milliseconds to the seconds used internally
#[inline]
pub fn millis_to_secs(ms: f64) -> f64 {
    ms / 1000.0
}

/// Parse the longest numeric prefix of `text`, like a lenient float parser.
///
/// Leading whitespace is skipped and trailing garbage ignored (`"24.5\r"`
/// gives 24.5). Returns NaN when there is no numeric prefix at all.
pub fn parse_leading_f64(text: &str) -> f64 {
    let text = text.trim_start();
    let (sign, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, &text[1..]),
        Some(b'+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };
    if unsigned.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = unsigned.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }

    // Optional exponent, only taken when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    unsigned[..end]
        .parse::<f64>()
        .map(|v| sign * v)
        .unwrap_or(f64::NAN)
}

/// Format a number for display: up to 3 decimals, trailing zeros trimmed
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
