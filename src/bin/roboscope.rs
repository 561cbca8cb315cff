//! Headless viewer: keep a scene in sync with a live robot.
//!
//! Usage: roboscope [--host HOST] [--port PORT] [--config FILE]
//!
//! Commands on stdin, one per line:
//!   pause | scrub N | map NAME | toggle LAYER | pose X Y THETA | goal X Y THETA
//!   connect HOST:PORT | quit

use std::io::BufRead;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{Receiver, select, tick, unbounded};
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

use roboscope::link::MAX_BACKLOG;
use roboscope::{FrameOutcome, Intent, Link, LinkEvent, SceneSync, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "roboscope", version, about = "Live robot telemetry viewer")]
struct Args {
    /// JSON config file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot hostname.
    #[arg(long)]
    host: Option<String>,

    /// Robot port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Map to load at startup (`--blank--` for none).
    #[arg(short, long)]
    map: Option<String>,

    /// Directory holding `<map>.json` files.
    #[arg(long)]
    maps_dir: Option<PathBuf>,

    /// Frames kept for scrubbing while paused.
    #[arg(long)]
    replay_capacity: Option<usize>,

    /// Seconds between stats log lines.
    #[arg(long, default_value_t = 5)]
    stats_interval: u64,

    /// Debug logging (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(args: &Args) -> Result<ViewerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(host) = &args.host {
        config.connection.hostname = host.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(map) = &args.map {
        config.map_name = map.clone();
    }
    if let Some(dir) = &args.maps_dir {
        config.maps_dir = dir.clone();
    }
    if let Some(capacity) = args.replay_capacity {
        config.replay_capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

/// Stdin lines on a channel. The returned sender keeps the channel open
/// after EOF so the main loop never sees a disconnected receiver.
fn spawn_stdin() -> (Receiver<String>, crossbeam_channel::Sender<String>) {
    let (tx, rx) = unbounded();
    let keepalive = tx.clone();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    (rx, keepalive)
}

enum Input {
    Link(LinkEvent),
    Line(String),
    Watchdog,
    Stats,
}

enum Flow {
    Continue,
    Quit,
}

fn handle_line(line: &str, scene: &mut SceneSync, link: &mut Link) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }
    if line.eq_ignore_ascii_case("quit") {
        return Flow::Quit;
    }
    if let Some(target) = line.strip_prefix("connect ") {
        match parse_target(target.trim()) {
            Some((host, port)) => link.retarget(host, port),
            None => warn!(addr = target, "expected connect HOST:PORT"),
        }
        return Flow::Continue;
    }

    match line.parse::<Intent>() {
        Ok(intent) => {
            if let Some(msg) = scene.apply_intent(intent)
                && let Err(e) = link.send_control(&msg)
            {
                warn!(error = %e, "failed to send control message");
            }
        }
        Err(e) => warn!(error = %e, "bad command"),
    }
    Flow::Continue
}

fn parse_target(s: &str) -> Option<(&str, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = load_config(&args)?;

    let mut scene = SceneSync::new(&config);
    if let Err(e) = scene.load_map(&config.map_name) {
        warn!(error = %e, "starting without a map");
    }

    let (link_tx, link_rx) = unbounded();
    let mut link = Link::new(&config, link_tx);
    let (stdin_rx, _stdin_keepalive) = spawn_stdin();
    let watchdog = tick(config.watchdog_period());
    let stats = tick(Duration::from_secs(args.stats_interval.max(1)));

    info!(robot = %link.target(), "starting");
    link.on_tick();

    loop {
        // Neither channel disconnects while `link` and the stdin keepalive live.
        let input = select! {
            recv(link_rx) -> event => event.ok().map(Input::Link),
            recv(stdin_rx) -> line => line.ok().map(Input::Line),
            recv(watchdog) -> _ => Some(Input::Watchdog),
            recv(stats) -> _ => Some(Input::Stats),
        };
        let Some(input) = input else { break };

        match input {
            Input::Link(event) => {
                let Some(bytes) = link.on_event(event) else { continue };
                if link_rx.len() > MAX_BACKLOG {
                    scene.record_backlog_drop();
                    continue;
                }
                if let FrameOutcome::Accepted = scene.on_frame(&bytes)
                    && let Some(frame) = scene.current_frame()
                {
                    trace!(
                        len = bytes.len(),
                        particles = frame.particles.len(),
                        rays = frame.laser.ranges.len(),
                        "frame"
                    );
                }
            }
            Input::Line(line) => {
                if let Flow::Quit = handle_line(&line, &mut scene, &mut link) {
                    break;
                }
            }
            Input::Watchdog => {
                link.on_tick();
            }
            Input::Stats => {
                let s = scene.stats();
                info!(
                    link = ?link.state(),
                    paused = scene.is_paused(),
                    received = s.received,
                    accepted = s.accepted,
                    dropped_paused = s.dropped_paused,
                    dropped_backlog = s.dropped_backlog,
                    decode_errors = s.decode_errors,
                    pose_unavailable = s.pose_unavailable,
                    scrubs = s.scrubs,
                    "stats"
                );
            }
        }
    }

    link.close();
    info!("bye");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_targets() {
        assert_eq!(parse_target("localhost:10272"), Some(("localhost", 10272)));
        assert_eq!(parse_target("::1:9000"), Some(("::1", 9000)));
        assert_eq!(parse_target(":9000"), None);
        assert_eq!(parse_target("robot"), None);
        assert_eq!(parse_target("robot:port"), None);
    }
}
