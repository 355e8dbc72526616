//! UDP transport
//!
//! Devices send telemetry datagrams to the telemetry port; each datagram is
//! one payload of newline-separated lines. Remote commands go back to the
//! device's command port.

use crossbeam_channel::Sender;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{CommandSink, Payload};
use crate::error::{LasecPlotError, Result, ResultExt};
use crate::types::Origin;

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 65_535;

/// How often the listener checks the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Telemetry listener
#[derive(Debug)]
pub struct UdpInput {
    socket: UdpSocket,
    /// When set, datagrams from other hosts are ignored
    remote: Option<IpAddr>,
}

impl UdpInput {
    /// Bind the listener to `address` (e.g. `0.0.0.0:47269`)
    pub fn bind(address: &str) -> Result<Self> {
        let socket = UdpSocket::bind(address).with_context(|| format!("Binding UDP {}", address))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .context("Setting UDP read timeout")?;
        tracing::info!("Listening for telemetry on UDP {}", address);
        Ok(Self {
            socket,
            remote: None,
        })
    }

    /// Only accept datagrams from `remote`
    pub fn with_remote(mut self, remote: IpAddr) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// A sender for remote commands sharing the listener socket
    pub fn command_sender(&self, target: SocketAddr) -> Result<UdpCommandSender> {
        let socket = self.socket.try_clone().context("Cloning UDP socket")?;
        Ok(UdpCommandSender { socket, target })
    }

    /// Run the listener on its own thread. Returns the number of datagrams
    /// forwarded when `running` is cleared or the receiver goes away.
    pub fn spawn(self, tx: Sender<Payload>, running: Arc<AtomicBool>) -> Result<JoinHandle<Result<u64>>> {
        std::thread::Builder::new()
            .name("udp-input".to_string())
            .spawn(move || self.run(&tx, &running))
            .map_err(|e| LasecPlotError::Transport(format!("Failed to spawn UDP thread: {}", e)))
    }

    fn run(self, tx: &Sender<Payload>, running: &AtomicBool) -> Result<u64> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut forwarded = 0;

        while running.load(Ordering::SeqCst) {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(LasecPlotError::from(e).with_context("Receiving UDP datagram")),
            };

            if !accepts(self.remote, from) {
                tracing::trace!("Ignoring datagram from {}", from);
                continue;
            }

            let data = String::from_utf8_lossy(&buf[..len]).replace("\r\n", "\n");
            if tx.send(Payload::received_now(data, Origin::Udp)).is_err() {
                break;
            }
            forwarded += 1;
        }

        tracing::info!("UDP listener stopped after {} datagrams", forwarded);
        Ok(forwarded)
    }
}

fn accepts(remote: Option<IpAddr>, from: SocketAddr) -> bool {
    remote.map_or(true, |ip| ip == from.ip())
}

/// Resolve a `host` or `host:port` string, using `default_port` when absent
pub fn resolve_host(host: &str, default_port: u16) -> Result<SocketAddr> {
    let has_port = host
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    let with_port = if has_port || host.parse::<SocketAddr>().is_ok() {
        host.to_string()
    } else {
        format!("{}:{}", host, default_port)
    };
    with_port
        .to_socket_addrs()
        .with_context(|| format!("Resolving {}", host))?
        .next()
        .ok_or_else(|| LasecPlotError::Transport(format!("No address for {}", host)))
}

/// Sends command lines to the device command port
#[derive(Debug)]
pub struct UdpCommandSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpCommandSender {
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl CommandSink for UdpCommandSender {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let datagram = format!("{}\n", line);
        self.socket
            .send_to(datagram.as_bytes(), self.target)
            .with_context(|| format!("Sending command to {}", self.target))?;
        Ok(())
    }
}
