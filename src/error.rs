//! Error handling for LasecPlot
//!
//! This module defines the crate error type and a Result alias used by the
//! protocol parsers, the channel registry, configuration and transports.
//!
//! Protocol errors never abort a payload: the session catches them per record,
//! logs them and moves on to the next line.

use thiserror::Error;

use crate::types::TelemetryKind;

/// Main error type for LasecPlot operations
#[derive(Error, Debug)]
pub enum LasecPlotError {
    /// A variable or shape line without the `key:values` separator
    #[error("Missing ':' separator in line: {0}")]
    MissingSeparator(String),

    /// A single value item that could not be decoded
    #[error("Invalid item '{item}': {reason}")]
    InvalidItem { item: String, reason: String },

    /// A shape update with no kind while the channel has no previous shape
    #[error("No type given for shape '{0}' (cube, sphere ... should be passed)")]
    ShapeWithoutType(String),

    /// Malformed shape attribute list
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// A line for an existing channel carrying data of another kind
    #[error("Channel '{key}' holds {existing} data, line carries {incoming}")]
    KindMismatch {
        key: String,
        existing: TelemetryKind,
        incoming: TelemetryKind,
    },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the UDP/serial glue
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LasecPlotError>,
    },
}

impl LasecPlotError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LasecPlotError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an item-level decoding failure
    pub fn invalid_item(item: impl Into<String>, reason: impl Into<String>) -> Self {
        LasecPlotError::InvalidItem {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for LasecPlot operations
pub type Result<T> = std::result::Result<T, LasecPlotError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LasecPlotError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LasecPlotError::from(e).with_context(f()))
    }
}
