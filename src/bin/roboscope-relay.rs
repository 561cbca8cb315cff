//! Capture, replay and synthesize robot telemetry.
//!
//! Usage:
//!   roboscope-relay capture HOST:PORT > run.cap
//!   roboscope-relay echo 10272 [--rate 20] < run.cap
//!   roboscope-relay synth 10272
//!   roboscope-relay inspect < run.cap

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roboscope::capture::{self, encode_line};
use roboscope::codec::Endian;
use roboscope::{ConnError, Connection, TelemetryFrame, synth};

#[derive(Parser, Debug)]
#[command(name = "roboscope-relay", version, about = "Capture and replay robot telemetry")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a robot and print each message as a base64 line.
    Capture {
        /// Robot address, HOST:PORT.
        addr: String,
    },
    /// Serve a capture to every client, looping forever.
    Echo {
        port: u16,
        /// Capture file (stdin if omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Messages per second.
        #[arg(long, default_value_t = 20.0)]
        rate: f64,
    },
    /// Serve generated frames of a robot driving in a circle.
    Synth {
        port: u16,
        /// Frames per second.
        #[arg(long, default_value_t = 20.0)]
        rate: f64,
        /// Big-endian frames instead of little-endian.
        #[arg(long)]
        big_endian: bool,
    },
    /// Decode a capture and print one JSON summary per message.
    Inspect {
        /// Capture file (stdin if omitted).
        input: Option<PathBuf>,
        /// Print full frames instead of counts.
        #[arg(long)]
        full: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

fn capture_to_stdout(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Connection::connect(addr)?;
    info!(%addr, "capturing");
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut count = 0u64;
    loop {
        match conn.recv() {
            Ok(message) => {
                writeln!(out, "{}", encode_line(&message))?;
                out.flush()?;
                count += 1;
            }
            Err(ConnError::Disconnected) => {
                info!(messages = count, "robot closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

fn period(rate: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(format!("rate must be a positive number, got {rate}").into());
    }
    Ok(Duration::from_secs_f64(1.0 / rate))
}

/// Accept clients forever; each gets its own stream of `source(n)` for
/// n = 0, 1, 2, … at the given period until it disconnects.
fn serve(
    port: u16,
    period: Duration,
    source: impl Fn(u64) -> Vec<u8> + Send + Sync + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!(port, ?period, "listening");
    let source = Arc::new(source);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let source = Arc::clone(&source);
        thread::spawn(move || {
            let mut conn = Connection::from_stream(stream);
            let peer = conn.peer_addr().map(|a| a.to_string()).unwrap_or_default();
            info!(%peer, "client connected");
            for n in 0.. {
                if let Err(e) = conn.send(&(*source)(n)) {
                    info!(%peer, error = %e, sent = n, "client gone");
                    return;
                }
                thread::sleep(period);
            }
        });
    }
    Ok(())
}

fn read_input(input: Option<&PathBuf>) -> Result<Vec<Vec<u8>>, Box<dyn std::error::Error>> {
    let messages = match input {
        Some(path) => capture::read_capture(BufReader::new(File::open(path)?))?,
        None => capture::read_capture(io::stdin().lock())?,
    };
    Ok(messages)
}

fn serve_capture(
    port: u16,
    input: Option<&PathBuf>,
    rate: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let period = period(rate)?;
    let messages = read_input(input)?;
    if messages.is_empty() {
        return Err("capture contains no messages".into());
    }
    info!(messages = messages.len(), "loaded capture");
    serve(port, period, move |n| messages[(n % messages.len() as u64) as usize].clone())
}

fn serve_synth(port: u16, rate: f64, big_endian: bool) -> Result<(), Box<dyn std::error::Error>> {
    let period = period(rate)?;
    let endian = if big_endian { Endian::Big } else { Endian::Little };
    serve(port, period, move |n| synth::frame(n).encode(endian))
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

/// One JSON line per captured message. Every form carries `index` and
/// `bytes` so output lines up with the capture.
fn inspect_message(
    index: usize,
    message: &[u8],
    full: bool,
) -> Result<serde_json::Value, serde_json::Error> {
    let summary = match TelemetryFrame::decode(message) {
        Ok(frame) if full => serde_json::json!({
            "index": index,
            "bytes": message.len(),
            "frame": serde_json::to_value(&frame)?,
        }),
        Ok(frame) => serde_json::json!({
            "index": index,
            "bytes": message.len(),
            "endian": format!("{:?}", Endian::sniff(message)),
            "header": frame.header,
            "pose": roboscope::pose::estimate(&frame),
        }),
        Err(e) => serde_json::json!({
            "index": index,
            "bytes": message.len(),
            "error": e.to_string(),
        }),
    };
    Ok(summary)
}

fn inspect(input: Option<&PathBuf>, full: bool) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (i, message) in read_input(input)?.iter().enumerate() {
        writeln!(out, "{}", inspect_message(i, message, full)?)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);
    match &args.command {
        Command::Capture { addr } => capture_to_stdout(addr),
        Command::Echo { port, input, rate } => serve_capture(*port, input.as_ref(), *rate),
        Command::Synth { port, rate, big_endian } => serve_synth(*port, *rate, *big_endian),
        Command::Inspect { input, full } => inspect(input.as_ref(), *full),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
