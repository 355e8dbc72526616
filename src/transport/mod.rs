//! Transport glue
//!
//! Transports run on their own threads and forward [`Payload`]s to the
//! session thread over a crossbeam channel. The session never blocks on I/O.
//!
//! # Main Types
//!
//! - [`Payload`] - Text received in one read, stamped with the receive time
//! - [`LineAssembler`] - Rebuilds newline-terminated lines from byte chunks
//! - [`CommandSink`] - Where remote command lines are written
//! - [`udp::UdpInput`] / [`serial::SerialInput`] - Device transports
//! - [`spawn_reader_input`] - Replays any `BufRead` (file, stdin)

pub mod serial;
pub mod udp;

use crossbeam_channel::Sender;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{LasecPlotError, Result};
use crate::types::Origin;

/// Longest line kept before it is forcibly split
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Text delivered by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Newline-separated records
    pub data: String,
    /// Wall-clock receive time in milliseconds
    pub timestamp_ms: Option<f64>,
    pub origin: Origin,
}

impl Payload {
    /// Payload without a receive time; the session clock stamps it
    pub fn new(data: impl Into<String>, origin: Origin) -> Self {
        Self {
            data: data.into(),
            timestamp_ms: None,
            origin,
        }
    }

    /// Payload stamped with the current wall-clock time
    pub fn received_now(data: impl Into<String>, origin: Origin) -> Self {
        Self {
            data: data.into(),
            timestamp_ms: Some(chrono::Utc::now().timestamp_millis() as f64),
            origin,
        }
    }
}

/// Sends command lines to a device
pub trait CommandSink: Send {
    /// Write one line; the newline is added by the sink
    fn send_line(&mut self, line: &str) -> Result<()>;
}

// ==================== Line Assembler ====================

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives and a `\r` right before it is
/// dropped. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_length: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl LineAssembler {
    pub fn new(max_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_length: max_length.max(1),
        }
    }

    /// Feed bytes, returning every line they complete
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }
                lines.push(self.take());
                continue;
            }
            self.buffer.push(byte);
            if self.buffer.len() >= self.max_length {
                tracing::warn!("Line longer than {} bytes, splitting", self.max_length);
                let rest = self.buffer.split_off(complete_prefix_len(&self.buffer));
                lines.push(self.take());
                self.buffer = rest;
            }
        }
        lines
    }

    /// Return the incomplete trailing line, if any
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}

/// Length of the longest prefix of `bytes` that does not end inside a
/// multi-byte UTF-8 sequence. Falls back to the whole slice when no such
/// non-empty prefix exists.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let Some(start) = bytes.iter().rposition(|b| b & 0xC0 != 0x80) else {
        return bytes.len();
    };
    let width = match bytes[start] {
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    };
    if start + width <= bytes.len() || start == 0 {
        bytes.len()
    } else {
        start
    }
}

/// Join the non-empty lines of one read into a payload string
pub(crate) fn join_lines(lines: Vec<String>) -> Option<String> {
    let lines: Vec<String> = lines.into_iter().filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

// ==================== Reader Input ====================

/// Forward every line of `reader` as its own payload until EOF, the receiver
/// goes away, or `running` is cleared. Returns the number of lines sent.
pub fn spawn_reader_input<R>(
    reader: R,
    origin: Origin,
    tx: Sender<Payload>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<u64>>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("reader-input".to_string())
        .spawn(move || forward_lines(reader, origin, &tx, &running))
        .map_err(|e| LasecPlotError::Transport(format!("Failed to spawn reader thread: {}", e)))
}

fn forward_lines<R: BufRead>(
    reader: R,
    origin: Origin,
    tx: &Sender<Payload>,
    running: &AtomicBool,
) -> Result<u64> {
    let mut sent = 0;
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            continue;
        }
        if tx.send(Payload::received_now(line, origin)).is_err() {
            break;
        }
        sent += 1;
    }
    tracing::info!("Reader input finished after {} lines", sent);
    Ok(sent)
}
