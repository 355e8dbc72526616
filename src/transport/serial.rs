//! Serial transport
//!
//! Reads arbitrary byte chunks from a serial port, reassembles lines and
//! forwards each read's complete lines as one device payload.

use crossbeam_channel::Sender;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{join_lines, CommandSink, LineAssembler, Payload};
use crate::error::{LasecPlotError, Result, ResultExt};
use crate::types::Origin;

/// Read timeout, also the running-flag polling interval
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// An open serial port
pub struct SerialInput {
    port: Box<dyn SerialPort>,
    path: String,
}

impl std::fmt::Debug for SerialInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialInput").field("path", &self.path).finish()
    }
}

impl SerialInput {
    /// Open `path` at `baud_rate`
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| LasecPlotError::from(e).with_context(format!("Opening {}", path)))?;
        tracing::info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// A command writer sharing the port
    pub fn command_sender(&self) -> Result<SerialCommandSender> {
        let port = self.port.try_clone()?;
        Ok(SerialCommandSender { port })
    }

    /// Run the reader on its own thread. Returns the number of payloads
    /// forwarded when `running` is cleared or the receiver goes away.
    pub fn spawn(self, tx: Sender<Payload>, running: Arc<AtomicBool>) -> Result<JoinHandle<Result<u64>>> {
        std::thread::Builder::new()
            .name("serial-input".to_string())
            .spawn(move || self.run(&tx, &running))
            .map_err(|e| LasecPlotError::Transport(format!("Failed to spawn serial thread: {}", e)))
    }

    fn run(mut self, tx: &Sender<Payload>, running: &AtomicBool) -> Result<u64> {
        let mut assembler = LineAssembler::default();
        let mut buf = [0u8; 4096];
        let mut forwarded = 0;

        while running.load(Ordering::SeqCst) {
            let len = match self.port.read(&mut buf) {
                Ok(0) => continue,
                Ok(len) => len,
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    return Err(LasecPlotError::from(e).with_context(format!("Reading {}", self.path)));
                }
            };

            let Some(data) = join_lines(assembler.feed(&buf[..len])) else {
                continue;
            };
            if tx.send(Payload::received_now(data, Origin::Serial)).is_err() {
                break;
            }
            forwarded += 1;
        }

        tracing::info!("Serial reader on {} stopped after {} payloads", self.path, forwarded);
        Ok(forwarded)
    }
}

/// Writes command lines to the serial port
pub struct SerialCommandSender {
    port: Box<dyn SerialPort>,
}

impl CommandSink for SerialCommandSender {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(format!("{}\n", line).as_bytes())
            .context("Writing command to serial port")
    }
}
