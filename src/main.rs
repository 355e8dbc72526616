//! LasecPlot - Main Entry Point
//!
//! Headless driver: receives telemetry from UDP, a serial port or a capture
//! file, runs the session at the configured frame rate and reports channel
//! values.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use lasecplot::{
    config::{AppConfig, RuntimeSettings},
    protocol::command::{encode_command, LIST_COMMANDS_REQUEST},
    transport::{
        serial::SerialInput,
        spawn_reader_input,
        udp::{resolve_host, UdpInput},
        CommandSink,
    },
    Clock, Origin, Session,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    /// Config file (defaults to the app data directory)
    #[clap(long, env = "LASECPLOT_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON snapshots instead of log summaries
    #[clap(long)]
    json: bool,

    /// View window in seconds; 0 keeps everything
    #[clap(long)]
    view_duration: Option<String>,

    /// Seconds between summaries
    #[clap(long, default_value = "5")]
    summary_secs: f64,

    /// Remote command to invoke once connected (repeatable)
    #[clap(long = "send")]
    send: Vec<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Listen for UDP telemetry
    Udp {
        /// Local address to bind
        #[clap(long)]
        bind: Option<String>,

        /// Telemetry port
        #[clap(short, long)]
        port: Option<u16>,

        /// Device host; enables remote commands
        #[clap(short, long)]
        remote: Option<String>,
    },
    /// Read telemetry from a serial port
    Serial {
        /// Serial device, e.g. /dev/ttyUSB0
        port: Option<String>,

        #[clap(short, long)]
        baud: Option<u32>,
    },
    /// Replay a capture file, or stdin, as device output
    Replay {
        file: Option<PathBuf>,

        /// Lines are host records (no device `>` convention)
        #[clap(long)]
        host: bool,
    },
}

type InputHandle = JoinHandle<lasecplot::Result<u64>>;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lasecplot=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path);
    config.apply_env_overrides();
    tracing::debug!("Using config {:?}: {:?}", config_path, config);

    let (tx, rx) = crossbeam_channel::unbounded();
    let running = Arc::new(AtomicBool::new(true));

    let (input, mut commands): (InputHandle, Option<Box<dyn CommandSink>>) = match args.command {
        Command::Udp { bind, port, remote } => {
            if let Some(bind) = bind {
                config.ingest.bind_address = bind;
            }
            if let Some(port) = port {
                config.ingest.udp_port = port;
            }
            let mut udp = UdpInput::bind(&config.ingest.udp_bind_address())?;
            let mut sink: Option<Box<dyn CommandSink>> = None;
            if let Some(host) = remote.or_else(|| config.ingest.remote_address.clone()) {
                let target = resolve_host(&host, config.ingest.cmd_udp_port)?;
                udp = udp.with_remote(target.ip());
                sink = Some(Box::new(udp.command_sender(target)?));
                tracing::info!("Remote commands go to {}", target);
            }
            (udp.spawn(tx, running.clone())?, sink)
        }
        Command::Serial { port, baud } => {
            let path = port
                .or_else(|| config.ingest.serial_port.clone())
                .context("No serial port given on the command line or in the config")?;
            let serial = SerialInput::open(&path, baud.unwrap_or(config.ingest.baud_rate))?;
            let sink: Box<dyn CommandSink> = Box::new(serial.command_sender()?);
            (serial.spawn(tx, running.clone())?, Some(sink))
        }
        Command::Replay { file, host } => {
            let origin = if host { Origin::Local } else { Origin::Serial };
            let reader: Box<dyn BufRead + Send> = match file {
                Some(path) => Box::new(BufReader::new(
                    File::open(&path).with_context(|| format!("Opening {}", path.display()))?,
                )),
                None => Box::new(BufReader::new(std::io::stdin())),
            };
            (spawn_reader_input(reader, origin, tx, running.clone())?, None)
        }
    };

    let view_duration = args
        .view_duration
        .clone()
        .unwrap_or_else(|| config.view.view_duration_secs.to_string());
    let mut session = Session::new().with_settings(RuntimeSettings {
        paused: false,
        view_duration,
    });

    if let Some(sink) = commands.as_mut() {
        for name in &args.send {
            if let Err(e) = sink.send_line(&encode_command(name)) {
                tracing::warn!("Failed to send command '{}': {}", name, e);
            }
        }
    }

    let frame = config.view.frame_period();
    let refresh = Duration::from_secs_f64(config.view.command_refresh_secs.max(0.1));
    let summary = Duration::from_secs_f64(args.summary_secs.max(0.1));
    let mut last_refresh: Option<Instant> = None;
    let mut last_summary = Instant::now();
    let mut printed_logs = 0;

    tracing::info!("Running at {} Hz", config.view.frame_rate_hz.max(1));
    loop {
        let deadline = Instant::now() + frame;
        let mut finished = false;
        loop {
            match rx.recv_deadline(deadline) {
                Ok(payload) => session.ingest_payload(&payload),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    finished = true;
                    break;
                }
            }
        }

        session.tick();

        if !args.json {
            for entry in &session.logs()[printed_logs..] {
                tracing::info!(target: "device", "[{:.3}] {}", entry.timestamp, entry.text);
            }
        }
        printed_logs = session.logs().len();

        if let Some(sink) = commands.as_mut() {
            if last_refresh.map_or(true, |t| t.elapsed() >= refresh) {
                if let Err(e) = sink.send_line(LIST_COMMANDS_REQUEST) {
                    tracing::warn!("Command list request failed: {}", e);
                }
                last_refresh = Some(Instant::now());
            }
        }

        if finished || last_summary.elapsed() >= summary {
            report(&session, args.json)?;
            last_summary = Instant::now();
        }
        if finished {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    match input.join() {
        Ok(Ok(count)) => tracing::info!("Input closed after {} payloads", count),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => anyhow::bail!("Input thread panicked"),
    }
    Ok(())
}

fn report<C: Clock>(session: &Session<C>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(&session.snapshot(false))?);
        return Ok(());
    }

    let stats = session.stats();
    tracing::info!(
        "{} channels, {:.1} points/s, {:.1} logs/s, {} line errors, {} item errors",
        session.registry().len(),
        session.telemetry_rate(),
        session.log_rate(),
        stats.line_errors,
        stats.item_errors
    );
    for channel in session.registry().iter() {
        tracing::info!(
            "  {:<20} {:<6} {:>8} pts  {}",
            channel.name(),
            channel.kind().to_string(),
            channel.retained().len(),
            channel.formatted_value()
        );
    }
    if session.command_available() {
        tracing::info!("  commands: {}", session.commands().names().join(", "));
    }
    Ok(())
}
