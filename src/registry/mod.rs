//! Channel registry
//!
//! Owns every channel of a session, keyed by name.
//!
//! # Main Types
//!
//! - [`Channel`] - One named series with its staging buffer and current value
//! - [`ChannelRegistry`] - Lookup/creation, clear, append, flush and eviction
//! - [`ChannelSnapshot`] - Serializable read-only view for renderers
//! - [`series::Series`] - Parallel sequences for each telemetry kind
//! - [`widgets::SurfaceLayout`] - Which channels share a display surface
//!
//! # Lifecycle
//!
//! Channels are created on the first line that names them and live for the
//! rest of the session. Their kind never changes. Appends go to the staging
//! buffer; [`ChannelRegistry::flush`] moves staged points into the retained
//! series once per tick.

pub mod series;
pub mod widgets;

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{LasecPlotError, Result};
use crate::protocol::shape::ShapeState;
use crate::protocol::variable::PointBatch;
use crate::types::{CurrentValue, TelemetryKind};

pub use series::Series;
pub use widgets::{DisplaySurface, SurfaceId, SurfaceKind, SurfaceLayout};

/// A named telemetry channel
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    /// Display group given on creation
    widget_label: Option<String>,
    unit: String,
    kind: TelemetryKind,
    /// `None` when created with the `np` flag
    surface: Option<SurfaceId>,
    retained: Series,
    staging: Series,
    /// Points moved to `retained` by the latest flush
    last_tick: Series,
    /// Last value appended, visible before the next tick
    latest: Option<CurrentValue>,
    /// Value published by the latest flush
    current: Option<CurrentValue>,
    formatted: String,
}

impl Channel {
    fn new(name: &str, kind: TelemetryKind, unit: &str, widget_label: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            widget_label: widget_label.map(str::to_string),
            unit: unit.to_string(),
            kind,
            surface: None,
            retained: Series::new(kind),
            staging: Series::new(kind),
            last_tick: Series::new(kind),
            latest: None,
            current: None,
            formatted: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn widget_label(&self) -> Option<&str> {
        self.widget_label.as_deref()
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> TelemetryKind {
        self.kind
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn retained(&self) -> &Series {
        &self.retained
    }

    pub fn staging(&self) -> &Series {
        &self.staging
    }

    /// Points added to the retained series during the latest tick
    pub fn last_tick_points(&self) -> &Series {
        &self.last_tick
    }

    /// Last appended value, updated on every append
    pub fn latest_value(&self) -> Option<&CurrentValue> {
        self.latest.as_ref()
    }

    /// Value published by the latest flush
    pub fn current_value(&self) -> Option<&CurrentValue> {
        self.current.as_ref()
    }

    /// Display string of [`Channel::current_value`] with the unit
    pub fn formatted_value(&self) -> &str {
        &self.formatted
    }

    /// Newest shape snapshot known for a 3D channel, staged or retained
    pub fn latest_shape(&self) -> Option<&ShapeState> {
        self.staging
            .last_shape()
            .or_else(|| self.retained.last_shape())
    }

    /// Move staged points to the retained series and publish the new value.
    /// Returns the number of points moved.
    fn flush(&mut self) -> usize {
        self.last_tick.clear();
        if self.staging.is_empty() {
            return 0;
        }
        std::mem::swap(&mut self.staging, &mut self.last_tick);
        let moved = self.retained.extend_from(&self.last_tick);

        self.current = self.last_tick.last_value();
        self.formatted = self
            .current
            .as_ref()
            .map(|value| value.format(&self.unit))
            .unwrap_or_default();
        moved
    }

    pub fn snapshot(&self, with_series: bool) -> ChannelSnapshot {
        ChannelSnapshot {
            name: self.name.clone(),
            widget_label: self.widget_label.clone(),
            unit: self.unit.clone(),
            kind: self.kind,
            surface: self.surface,
            points: self.retained.len(),
            time_range: self.retained.time_range(),
            value: self.current.clone(),
            formatted: self.formatted.clone(),
            series: with_series.then(|| self.retained.clone()),
        }
    }
}

/// Read-only view of a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub name: String,
    pub widget_label: Option<String>,
    pub unit: String,
    pub kind: TelemetryKind,
    pub surface: Option<SurfaceId>,
    /// Retained point count
    pub points: usize,
    pub time_range: Option<(f64, f64)>,
    pub value: Option<CurrentValue>,
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Series>,
}

/// Result of flushing every channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushOutcome {
    /// Points moved into retained series
    pub points: usize,
    /// Channels that received points, in creation order
    pub updated: Vec<String>,
}

/// All channels of a session
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    /// Channels in creation order
    channels: Vec<Channel>,
    /// Name to position in `channels`
    index: HashMap<String, usize>,
    layout: SurfaceLayout,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the channel for `key`, creating it if needed.
    ///
    /// A new channel takes `kind`, `unit` and `widget_label`, and is attached
    /// to a display surface unless `attach` is false. An existing channel
    /// keeps its kind (a different `kind` is an error) and adopts `unit` if
    /// one is given.
    pub fn resolve(
        &mut self,
        key: &str,
        kind: TelemetryKind,
        unit: &str,
        widget_label: Option<&str>,
        attach: bool,
    ) -> Result<&mut Channel> {
        if let Some(&pos) = self.index.get(key) {
            let channel = &mut self.channels[pos];
            if channel.kind != kind {
                return Err(LasecPlotError::KindMismatch {
                    key: key.to_string(),
                    existing: channel.kind,
                    incoming: kind,
                });
            }
            if !unit.is_empty() && channel.unit != unit {
                channel.unit = unit.to_string();
            }
            return Ok(channel);
        }

        let mut channel = Channel::new(key, kind, unit, widget_label);
        if attach {
            channel.surface = Some(self.layout.attach(key, kind, widget_label));
        }
        tracing::debug!("New {} channel '{}'", kind, key);

        let pos = self.channels.len();
        self.index.insert(key.to_string(), pos);
        self.channels.push(channel);
        Ok(&mut self.channels[pos])
    }

    /// Empty the retained series of `key`. Staged points are kept.
    /// Returns false if the channel does not exist.
    pub fn clear(&mut self, key: &str) -> bool {
        match self.get_mut(key) {
            Some(channel) => {
                channel.retained.clear();
                true
            }
            None => false,
        }
    }

    /// Stage one batch for `key` and return the channel's new latest value
    pub fn append(&mut self, key: &str, batch: PointBatch) -> Result<Option<CurrentValue>> {
        let incoming = batch.kind();
        let channel = self.get_mut(key).ok_or_else(|| {
            LasecPlotError::invalid_item(key, "append to unknown channel")
        })?;
        let existing = channel.kind;

        let latest = batch.last_value();
        if channel.staging.append_batch(batch).is_none() {
            return Err(LasecPlotError::KindMismatch {
                key: key.to_string(),
                existing,
                incoming,
            });
        }
        if latest.is_some() {
            channel.latest = latest.clone();
        }
        Ok(latest)
    }

    /// Flush the staging buffer of every channel
    pub fn flush(&mut self) -> FlushOutcome {
        let mut outcome = FlushOutcome::default();
        for channel in &mut self.channels {
            let moved = channel.flush();
            if moved > 0 {
                tracing::trace!("Flushed {} points into '{}'", moved, channel.name);
                outcome.points += moved;
                outcome.updated.push(channel.name.clone());
            }
        }
        outcome
    }

    /// Drop retained points older than `window` seconds before each
    /// channel's newest point. Returns the number of points removed.
    pub fn evict(&mut self, window: f64) -> usize {
        self.channels
            .iter_mut()
            .map(|channel| channel.retained.evict_before_window(window))
            .sum()
    }

    pub fn get(&self, key: &str) -> Option<&Channel> {
        self.index.get(key).map(|&pos| &self.channels[pos])
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Channel> {
        let pos = *self.index.get(key)?;
        self.channels.get_mut(pos)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Channels in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    pub fn snapshot(&self, with_series: bool) -> Vec<ChannelSnapshot> {
        self.channels
            .iter()
            .map(|channel| channel.snapshot(with_series))
            .collect()
    }
}
