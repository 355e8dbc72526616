//! Log line parser
//!
//! Log lines are `>` followed by an optional millisecond timestamp, a `:`
//! and the text: `>1627551892437:motor started`, or `>:motor started`.

use crate::types::{millis_to_secs, parse_leading_f64, LogEntry};

/// Decode a `>[timestamp]:text` line.
///
/// The text is everything after the first `:`. A missing or unreadable
/// timestamp falls back to `now`. A line without `:` is kept whole as text.
pub fn parse_log_line(line: &str, now: f64) -> LogEntry {
    let Some(colon) = line.find(':') else {
        return LogEntry::new(now, line);
    };

    let stamp = line[..colon].strip_prefix('>').unwrap_or(&line[..colon]);
    let ms = parse_leading_f64(stamp);
    let timestamp = if ms.is_finite() {
        millis_to_secs(ms)
    } else {
        now
    };
    LogEntry::new(timestamp, &line[colon + 1..])
}
