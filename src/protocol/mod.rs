//! Line protocol
//!
//! Turns raw payloads into classified records and decodes each record kind.
//!
//! # Main Types
//!
//! - [`Record`] - One non-empty line with its resolved timestamp and origin
//! - [`RecordKind`] - Which parser handles a record
//! - [`variable::VariableLine`] - `key[,label]:values[§unit][|flags]`
//! - [`shape::ShapeUpdate`] - Attribute delta of a 3D shape value
//! - [`command::CommandSet`] - Remote commands announced by the device
//!
//! # Device lines
//!
//! Devices send variables as `>name:value` and anything else as free-form
//! log text. Before classification, device lines are normalized: a leading
//! `>` is stripped, and lines that do not start with `>`, `|` or `3D|` become
//! log lines (`>:` + text).

pub mod command;
pub mod log;
pub mod shape;
pub mod variable;

use std::borrow::Cow;

use crate::types::{millis_to_secs, Origin};

/// Handler selected for a record by its leading sigil
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `|cmd1|cmd2|`
    CommandList,
    /// `3D|key:...`
    Shape,
    /// `>[ts]:text`
    Log,
    /// `key:values|flags`
    Variable,
}

/// One line of a payload, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    pub text: Cow<'a, str>,
    /// Base timestamp of the payload, in seconds
    pub timestamp: f64,
    pub origin: Origin,
    pub kind: RecordKind,
}

/// Effective payload timestamp in seconds.
///
/// The supplied wall-clock milliseconds win when present and finite;
/// otherwise the receive time is used.
pub fn resolve_base_timestamp(supplied_ms: Option<f64>, now_ms: f64) -> f64 {
    match supplied_ms {
        Some(ms) if ms.is_finite() => millis_to_secs(ms),
        _ => millis_to_secs(now_ms),
    }
}

/// Split a payload into classified records, skipping empty lines
pub fn split_records(payload: &str, timestamp: f64, origin: Origin) -> impl Iterator<Item = Record<'_>> {
    payload
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(move |line| {
            let text = if origin.is_device() {
                normalize_device_line(line)
            } else {
                Cow::Borrowed(line)
            };
            let kind = classify(&text);
            Record {
                text,
                timestamp,
                origin,
                kind,
            }
        })
}

/// Rewrite a device line into the host form understood by [`classify`]
pub fn normalize_device_line(line: &str) -> Cow<'_, str> {
    if let Some(rest) = line.strip_prefix('>') {
        Cow::Borrowed(rest)
    } else if line.starts_with('|') || line.starts_with("3D|") {
        Cow::Borrowed(line)
    } else {
        Cow::Owned(format!(">:{}", line))
    }
}

/// Pick the handler for a host-form line
pub fn classify(line: &str) -> RecordKind {
    if line.starts_with('|') {
        RecordKind::CommandList
    } else if line.starts_with("3D|") {
        RecordKind::Shape
    } else if line.starts_with('>') {
        RecordKind::Log
    } else {
        RecordKind::Variable
    }
}

/// Split `name[,label]`; an empty label counts as none
pub(crate) fn split_widget_label(key: &str) -> (&str, Option<&str>) {
    let mut parts = key.split(',');
    let name = parts.next().unwrap_or(key);
    let label = parts.next().filter(|label| !label.is_empty());
    (name, label)
}
