//! Variable line parser
//!
//! Grammar: `key[,label]:values[§unit][|flags]`, where `values` is either a
//! single value or a `;`-separated batch of `timestamp:value` items.
//!
//! Item-level failures (bad timestamp, wrong arity) are logged and skip only
//! the offending item; the rest of the batch is still delivered.

use crate::error::{LasecPlotError, Result};
use crate::protocol::shape::ShapeState;
use crate::protocol::split_widget_label;
use crate::types::{millis_to_secs, parse_leading_f64, CurrentValue, TelemetryKind};

/// Unit marker
const UNIT_MARKER: char = '§';

/// Line flags, recognised by substring like the firmware libraries emit them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// `t`: values are text
    pub text: bool,
    /// `xy`: values are `x:y[:timestamp]` pairs
    pub xy: bool,
    /// `clr`: drop retained data before appending
    pub clear: bool,
    /// `np`: do not attach the channel to a display surface
    pub no_plot: bool,
}

impl Flags {
    pub fn parse(raw: &str) -> Self {
        Self {
            text: raw.contains('t'),
            xy: raw.contains("xy"),
            clear: raw.contains("clr"),
            no_plot: raw.contains("np"),
        }
    }

    /// Kind of a variable line carrying these flags; `xy` wins over `t`
    pub fn kind(&self) -> TelemetryKind {
        if self.xy {
            TelemetryKind::Xy
        } else if self.text {
            TelemetryKind::Text
        } else {
            TelemetryKind::Number
        }
    }
}

/// Points decoded from one line, in input order
#[derive(Debug, Clone, PartialEq)]
pub enum PointBatch {
    Number {
        times: Vec<f64>,
        values: Vec<f64>,
    },
    Text {
        times: Vec<f64>,
        values: Vec<String>,
    },
    Xy {
        xs: Vec<f64>,
        ys: Vec<f64>,
        /// Auxiliary timestamps, used for eviction only
        times: Vec<f64>,
    },
    Shape {
        times: Vec<f64>,
        shapes: Vec<ShapeState>,
    },
}

impl PointBatch {
    /// Empty batch of the given kind
    pub fn empty(kind: TelemetryKind) -> Self {
        match kind {
            TelemetryKind::Number => PointBatch::Number {
                times: Vec::new(),
                values: Vec::new(),
            },
            TelemetryKind::Text => PointBatch::Text {
                times: Vec::new(),
                values: Vec::new(),
            },
            TelemetryKind::Xy => PointBatch::Xy {
                xs: Vec::new(),
                ys: Vec::new(),
                times: Vec::new(),
            },
            TelemetryKind::Shape3d => PointBatch::Shape {
                times: Vec::new(),
                shapes: Vec::new(),
            },
        }
    }

    /// Single shape snapshot
    pub fn shape(timestamp: f64, shape: ShapeState) -> Self {
        PointBatch::Shape {
            times: vec![timestamp],
            shapes: vec![shape],
        }
    }

    pub fn kind(&self) -> TelemetryKind {
        match self {
            PointBatch::Number { .. } => TelemetryKind::Number,
            PointBatch::Text { .. } => TelemetryKind::Text,
            PointBatch::Xy { .. } => TelemetryKind::Xy,
            PointBatch::Shape { .. } => TelemetryKind::Shape3d,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PointBatch::Number { times, .. }
            | PointBatch::Text { times, .. }
            | PointBatch::Xy { times, .. }
            | PointBatch::Shape { times, .. } => times.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of the last point, if any
    pub fn last_value(&self) -> Option<CurrentValue> {
        match self {
            PointBatch::Number { values, .. } => values.last().map(|v| CurrentValue::Number(*v)),
            PointBatch::Text { values, .. } => values.last().cloned().map(CurrentValue::Text),
            PointBatch::Xy { xs, ys, .. } => match (xs.last(), ys.last()) {
                (Some(x), Some(y)) => Some(CurrentValue::Xy { x: *x, y: *y }),
                _ => None,
            },
            PointBatch::Shape { shapes, .. } => shapes.last().cloned().map(CurrentValue::Shape),
        }
    }
}

/// A decoded variable line
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLine {
    pub name: String,
    pub widget_label: Option<String>,
    /// Empty when the line has no unit
    pub unit: String,
    pub flags: Flags,
    pub batch: PointBatch,
    /// Items dropped because they could not be decoded
    pub skipped: usize,
}

/// Parse a variable line.
///
/// Returns `Ok(None)` for lines that are recognised but deliberately ignored
/// (statsd-style keys). A line whose items were all rejected comes back with
/// an empty batch so the caller can still account for the skipped items.
pub fn parse_variable_line(line: &str, now: f64) -> Result<Option<VariableLine>> {
    let colon = line
        .find(':')
        .ok_or_else(|| LasecPlotError::MissingSeparator(line.to_string()))?;
    let key = &line[..colon];
    if key.starts_with("statsd") {
        return Ok(None);
    }
    let (name, widget_label) = split_widget_label(key);

    // Flags and unit only count when they come after the key
    let (mut end, flags) = match line.rfind('|') {
        Some(pipe) if pipe > colon => (pipe, Flags::parse(&line[pipe + 1..])),
        _ => (line.len(), Flags::default()),
    };
    let mut unit = "";
    if let Some(marker) = line[..end].find(UNIT_MARKER) {
        if marker > colon {
            unit = &line[marker + UNIT_MARKER.len_utf8()..end];
            end = marker;
        }
    }

    let values = &line[colon + 1..end];
    let items: Vec<&str> = values.split(';').collect();
    let is_batch = items.len() > 1;

    let mut skipped = 0;
    let mut batch = PointBatch::empty(flags.kind());
    for item in items.into_iter().filter(|item| !item.is_empty()) {
        if let Err(e) = push_item(&mut batch, item, is_batch, now) {
            tracing::warn!("Skipping item of '{}': {}", name, e);
            skipped += 1;
        }
    }

    Ok(Some(VariableLine {
        name: name.to_string(),
        widget_label: widget_label.map(str::to_string),
        unit: unit.to_string(),
        flags,
        batch,
        skipped,
    }))
}

fn push_item(batch: &mut PointBatch, item: &str, is_batch: bool, now: f64) -> Result<()> {
    let dims: Vec<&str> = item.split(':').collect();

    if let PointBatch::Xy { xs, ys, times } = batch {
        if dims.len() != 2 && dims.len() != 3 {
            return Err(LasecPlotError::invalid_item(item, "expected x:y[:timestamp]"));
        }
        let timestamp = match dims.get(2) {
            Some(ms) => millis_to_secs(parse_leading_f64(ms)),
            None => now,
        };
        xs.push(parse_leading_f64(dims[0]));
        ys.push(parse_leading_f64(dims[1]));
        times.push(timestamp);
        return Ok(());
    }

    let (timestamp, value) = match dims.as_slice() {
        [_] if is_batch => {
            return Err(LasecPlotError::invalid_item(item, "missing timestamp in batch"));
        }
        [value] => (now, *value),
        [ms, value] => {
            let ms = parse_leading_f64(ms);
            if !ms.is_finite() {
                return Err(LasecPlotError::invalid_item(item, "invalid timestamp"));
            }
            (millis_to_secs(ms), *value)
        }
        _ => return Err(LasecPlotError::invalid_item(item, "too many ':' separators")),
    };

    match batch {
        PointBatch::Number { times, values } => {
            times.push(timestamp);
            values.push(parse_leading_f64(value));
        }
        PointBatch::Text { times, values } => {
            times.push(timestamp);
            values.push(value.to_string());
        }
        PointBatch::Xy { .. } | PointBatch::Shape { .. } => {
            return Err(LasecPlotError::invalid_item(item, "unsupported batch kind"));
        }
    }
    Ok(())
}
