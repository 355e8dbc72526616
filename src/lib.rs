//! # LasecPlot: streaming telemetry decoder
//!
//! Decodes the line-oriented telemetry protocol spoken by microcontroller
//! firmware over serial or UDP, and keeps per-channel time series ready for a
//! renderer.
//!
//! ## Architecture
//!
//! - **Protocol**: splits payloads into records and decodes variable, 3D shape,
//!   log and command-list lines
//! - **Registry**: per-channel staging buffers and retained series with a
//!   sliding time window
//! - **Session**: the single owner of all state; `ingest()` on arrival,
//!   `tick()` at the frame rate
//! - **Transport**: UDP and serial readers on their own threads, forwarding
//!   payloads over crossbeam channels
//!
//! ## Wire format
//!
//! ```text
//! temp:21.5§°C                      single value, unit °C
//! temp:1627551892437:21.5;...       timestamped batch (ms)
//! state:ON|t                        text value
//! path:1:2;3:4|xy                   x/y pairs
//! 3D|cube:S:cube:P:1:2:3:C:red      3D shape
//! >1627551892437:booting            log line
//! |start|stop|                      available remote commands
//! ```
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform data directory under
//! `dev.lasecplot` (see [`config`]).
//!
//! ## Example
//!
//! ```
//! use lasecplot::{Origin, Session};
//!
//! let mut session = Session::new();
//! session.ingest("temp:1000:20.5;2000:21", None, Origin::Local);
//! session.tick();
//!
//! let temp = session.channel("temp").unwrap();
//! assert_eq!(temp.retained().len(), 2);
//! assert_eq!(temp.formatted_value(), "21");
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, RuntimeSettings};
pub use error::{LasecPlotError, Result, ResultExt};
pub use registry::{Channel, ChannelRegistry, ChannelSnapshot, Series};
pub use session::{Clock, ManualClock, Session, SessionSnapshot, SystemClock, TickReport};
pub use transport::Payload;
pub use types::{CurrentValue, IngestStats, LogEntry, Origin, TelemetryKind};
