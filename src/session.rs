//! Telemetry session
//!
//! A [`Session`] owns all state of one telemetry connection: the channel
//! registry, the known remote commands, the log queue and the runtime
//! settings. Transports feed it with [`Session::ingest`]; a scheduler calls
//! [`Session::tick`] at the frame rate to flush staged points into the
//! retained series.
//!
//! # Main Types
//!
//! - [`Session`] - Ingest entry point and tick flusher
//! - [`TickReport`] - What one tick did
//! - [`SessionSnapshot`] - Serializable view for renderers
//! - [`Clock`] - Wall-clock source ([`SystemClock`], or [`ManualClock`] for tests)
//!
//! # Pause
//!
//! While paused, payloads are dropped on arrival and logs stay queued.
//! Staging is still flushed on every tick, so nothing received before the
//! pause is lost and nothing received during it ever appears.

use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;

use crate::config::RuntimeSettings;
use crate::error::Result;
use crate::protocol::command::CommandSet;
use crate::protocol::log::parse_log_line;
use crate::protocol::shape::{parse_shape_line, parse_shape_value};
use crate::protocol::variable::{parse_variable_line, Flags, PointBatch};
use crate::protocol::{resolve_base_timestamp, split_records, Record, RecordKind};
use crate::registry::{Channel, ChannelRegistry, ChannelSnapshot};
use crate::transport::Payload;
use crate::types::{IngestStats, LogEntry, Origin, TelemetryKind};

/// Weight of the previous estimate in the smoothed rates
const RATE_SMOOTHING: f64 = 0.8;

// ==================== Clock ====================

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<f64>>);

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, ms: f64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.0.get()
    }
}

// ==================== Reports ====================

/// Outcome of one [`Session::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Points moved from staging into retained series
    pub points_flushed: usize,
    /// Log entries moved from the queue into the log
    pub logs_flushed: usize,
    /// Points dropped by the view window
    pub evicted: usize,
    /// Channels that received points, in creation order
    pub updated: Vec<String>,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub channels: Vec<ChannelSnapshot>,
    pub commands: Vec<String>,
    pub log_entries: usize,
    pub telemetry_rate: f64,
    pub log_rate: f64,
    pub paused: bool,
    pub stats: IngestStats,
}

// ==================== Session ====================

/// State of one telemetry connection
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    registry: ChannelRegistry,
    commands: CommandSet,
    /// Logs received since the last unpaused tick
    log_queue: Vec<LogEntry>,
    logs: Vec<LogEntry>,
    settings: RuntimeSettings,
    stats: IngestStats,
    /// Smoothed points per second
    telemetry_rate: f64,
    /// Smoothed logs per second
    log_rate: f64,
    last_tick_ms: Option<f64>,
    data_available: bool,
    log_available: bool,
    clock: C,
}

impl Session<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Session<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            commands: CommandSet::new(),
            log_queue: Vec::new(),
            logs: Vec::new(),
            settings: RuntimeSettings::default(),
            stats: IngestStats::default(),
            telemetry_rate: 0.0,
            log_rate: 0.0,
            last_tick_ms: None,
            data_available: false,
            log_available: false,
            clock,
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    // ==================== Ingest ====================

    /// Feed one payload.
    ///
    /// `timestamp_ms` is the wall-clock receive time supplied by the
    /// transport; when absent (or not finite) the session clock is used.
    /// Malformed lines are logged and skipped, they never abort the payload.
    pub fn ingest(&mut self, payload: &str, timestamp_ms: Option<f64>, origin: Origin) {
        self.stats.payloads += 1;
        if self.settings.paused {
            self.stats.dropped_while_paused += 1;
            return;
        }

        let timestamp = resolve_base_timestamp(timestamp_ms, self.clock.now_ms());
        for record in split_records(payload, timestamp, origin) {
            self.stats.records += 1;
            if let Err(e) = self.process_record(&record) {
                self.stats.line_errors += 1;
                tracing::warn!("Dropping {} line {:?}: {}", record.origin, record.text, e);
            }
        }
    }

    /// Feed a payload delivered by a transport
    pub fn ingest_payload(&mut self, payload: &Payload) {
        self.ingest(&payload.data, payload.timestamp_ms, payload.origin);
    }

    fn process_record(&mut self, record: &Record<'_>) -> Result<()> {
        match record.kind {
            RecordKind::CommandList => {
                let added = self.commands.merge_line(&record.text);
                if added > 0 {
                    tracing::debug!("{} new remote command(s), {} known", added, self.commands.len());
                }
                Ok(())
            }
            RecordKind::Log => {
                self.log_queue
                    .push(parse_log_line(&record.text, record.timestamp));
                Ok(())
            }
            RecordKind::Variable => self.ingest_variable(&record.text, record.timestamp),
            RecordKind::Shape => self.ingest_shape(&record.text, record.timestamp),
        }
    }

    fn ingest_variable(&mut self, text: &str, now: f64) -> Result<()> {
        let Some(line) = parse_variable_line(text, now)? else {
            return Ok(());
        };
        self.stats.item_errors += line.skipped as u64;
        if line.batch.is_empty() {
            return Ok(());
        }
        self.stage(
            &line.name,
            &line.unit,
            line.widget_label.as_deref(),
            line.flags,
            line.batch,
        )
    }

    /// Each shape value is resolved against the newest known snapshot and
    /// staged on its own; the first failing value aborts the rest of the line.
    /// With `clr` the retained snapshots are gone before the first value
    /// resolves, so nothing is inherited from them.
    fn ingest_shape(&mut self, text: &str, now: f64) -> Result<()> {
        let line = parse_shape_line(text)?;
        let existing_scene = self
            .registry
            .get(line.name)
            .is_some_and(|channel| channel.kind() == TelemetryKind::Shape3d);
        if line.flags.clear && existing_scene {
            self.registry.clear(line.name);
        }
        for value in &line.values {
            let (timestamp, update) = parse_shape_value(value, now)?;
            let previous = self.registry.get(line.name).and_then(Channel::latest_shape);
            let shape = update.resolve(previous)?;
            self.stage(
                line.name,
                "",
                line.widget_label,
                line.flags,
                PointBatch::shape(timestamp, shape),
            )?;
        }
        Ok(())
    }

    fn stage(
        &mut self,
        name: &str,
        unit: &str,
        widget_label: Option<&str>,
        flags: Flags,
        batch: PointBatch,
    ) -> Result<()> {
        self.registry
            .resolve(name, batch.kind(), unit, widget_label, !flags.no_plot)?;
        if flags.clear {
            self.registry.clear(name);
        }
        self.registry.append(name, batch)?;
        Ok(())
    }

    // ==================== Tick ====================

    /// Flush staged points, apply the view window, drain logs and update
    /// the throughput estimates.
    pub fn tick(&mut self) -> TickReport {
        let now_ms = self.clock.now_ms();

        let flushed = self.registry.flush();
        let evicted = self
            .settings
            .view_window()
            .map(|window| self.registry.evict(window))
            .unwrap_or(0);

        if !self.data_available && !self.registry.is_empty() {
            self.data_available = true;
            tracing::debug!("First telemetry received");
        }

        let queued_logs = self.log_queue.len();
        let logs_flushed = if self.settings.paused {
            0
        } else {
            self.logs.append(&mut self.log_queue);
            queued_logs
        };
        if !self.log_available && !self.logs.is_empty() {
            self.log_available = true;
        }

        self.update_rates(now_ms, flushed.points, queued_logs);

        tracing::trace!(
            "Tick: {} points, {} logs, {} evicted",
            flushed.points,
            logs_flushed,
            evicted
        );
        TickReport {
            points_flushed: flushed.points,
            logs_flushed,
            evicted,
            updated: flushed.updated,
        }
    }

    fn update_rates(&mut self, now_ms: f64, points: usize, logs: usize) {
        if let Some(last) = self.last_tick_ms {
            let elapsed_ms = now_ms - last;
            if elapsed_ms > 0.0 {
                let per_sec = 1000.0 / elapsed_ms;
                self.telemetry_rate = self.telemetry_rate * RATE_SMOOTHING
                    + per_sec * points as f64 * (1.0 - RATE_SMOOTHING);
                self.log_rate =
                    self.log_rate * RATE_SMOOTHING + per_sec * logs as f64 * (1.0 - RATE_SMOOTHING);
            }
        }
        self.last_tick_ms = Some(now_ms);
    }

    // ==================== Settings ====================

    pub fn is_paused(&self) -> bool {
        self.settings.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.settings.paused != paused {
            tracing::info!("{}", if paused { "Paused" } else { "Resumed" });
        }
        self.settings.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.settings.paused);
    }

    /// Set the view window from user text; non-positive disables eviction
    pub fn set_view_duration(&mut self, text: impl Into<String>) {
        self.settings.view_duration = text.into();
    }

    pub fn view_window(&self) -> Option<f64> {
        self.settings.view_window()
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    // ==================== Accessors ====================

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn channel(&self, key: &str) -> Option<&Channel> {
        self.registry.get(key)
    }

    pub fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Log entries drained so far
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Log entries waiting for the next unpaused tick
    pub fn pending_logs(&self) -> &[LogEntry] {
        &self.log_queue
    }

    pub fn telemetry_rate(&self) -> f64 {
        self.telemetry_rate
    }

    pub fn log_rate(&self) -> f64 {
        self.log_rate
    }

    /// Set once the first channel exists
    pub fn data_available(&self) -> bool {
        self.data_available
    }

    /// Set once the first log entry was drained
    pub fn log_available(&self) -> bool {
        self.log_available
    }

    pub fn command_available(&self) -> bool {
        !self.commands.is_empty()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn snapshot(&self, with_series: bool) -> SessionSnapshot {
        SessionSnapshot {
            channels: self.registry.snapshot(with_series),
            commands: self.commands.names().to_vec(),
            log_entries: self.logs.len(),
            telemetry_rate: self.telemetry_rate,
            log_rate: self.log_rate,
            paused: self.settings.paused,
            stats: self.stats.clone(),
        }
    }
}
