//! Self-healing connection to the robot.
//!
//! A [`Link`] owns the connection lifecycle. Connect attempts and reads run
//! on a background thread and report back as [`LinkEvent`]s on a channel;
//! the owner feeds those events to [`Link::on_event`] and calls
//! [`Link::on_tick`] from a fixed-period watchdog. A tick starts a new
//! attempt only when the link is [`LinkState::Disconnected`], so attempts
//! never overlap. Failures are retried on the next tick without backoff.
//!
//! ```text
//!  owner loop                          link thread
//!  ----------                          -----------
//!  on_tick() ── spawn ───────────────> connect_timeout()
//!      <───── Connected{writer} ────── ok: becomes the reader
//!      <───── Frame{bytes} ─────────── recv() ...
//!      <───── Closed{reason} ───────── error or EOF, thread exits
//! ```

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::conn::{ConnError, Connection, MessageWriter};
use crate::control::ControlMessage;

/// Frames queued behind the one being handled before the handled one is
/// considered stale and skipped.
pub const MAX_BACKLOG: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reported by the link thread. `generation` identifies the attempt so
/// events from a superseded target are discarded.
#[derive(Debug)]
pub enum LinkEvent {
    Connected { generation: u64, peer: Option<SocketAddr>, writer: MessageWriter },
    Frame { generation: u64, bytes: Vec<u8> },
    Closed { generation: u64, reason: String },
}

impl LinkEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Connected { generation, .. }
            | Self::Frame { generation, .. }
            | Self::Closed { generation, .. } => *generation,
        }
    }
}

pub struct Link {
    hostname: String,
    port: u16,
    connect_timeout: Duration,
    max_message_bytes: usize,
    state: LinkState,
    generation: u64,
    writer: Option<MessageWriter>,
    events: Sender<LinkEvent>,
    attempts: u64,
}

impl Link {
    /// Create a disconnected link. Nothing happens until the first tick.
    pub fn new(config: &ViewerConfig, events: Sender<LinkEvent>) -> Self {
        Self {
            hostname: config.connection.hostname.clone(),
            port: config.connection.port,
            connect_timeout: config.connection.connect_timeout(),
            max_message_bytes: config.connection.max_message_bytes,
            state: LinkState::Disconnected,
            generation: 0,
            writer: None,
            events,
            attempts: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Connect attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Watchdog tick. Starts a connect attempt if disconnected; returns
    /// whether one was started.
    pub fn on_tick(&mut self) -> bool {
        if self.state != LinkState::Disconnected {
            return false;
        }
        self.spawn_attempt();
        true
    }

    /// Point the link at a new robot. Any current connection is closed and
    /// an attempt against the new target starts immediately.
    pub fn retarget(&mut self, hostname: &str, port: u16) {
        info!(from = %self.target(), to = %format!("{hostname}:{port}"), "retargeting link");
        self.hostname = hostname.to_string();
        self.port = port;
        self.drop_connection();
        self.generation += 1;
        self.state = LinkState::Disconnected;
        self.spawn_attempt();
    }

    /// Apply an event from the link thread. Returns frame bytes for the
    /// current connection; stale events are discarded.
    pub fn on_event(&mut self, event: LinkEvent) -> Option<Vec<u8>> {
        if event.generation() != self.generation {
            if let LinkEvent::Connected { writer, .. } = event {
                // Superseded attempt that still succeeded.
                let _ = writer.shutdown();
            }
            return None;
        }
        match event {
            LinkEvent::Connected { peer, writer, .. } => {
                info!(addr = %self.target(), ?peer, "connected");
                self.writer = Some(writer);
                self.state = LinkState::Connected;
                None
            }
            LinkEvent::Frame { bytes, .. } => Some(bytes),
            LinkEvent::Closed { reason, .. } => {
                if self.state == LinkState::Connected {
                    info!(addr = %self.target(), %reason, "disconnected");
                } else {
                    debug!(addr = %self.target(), %reason, "connect attempt failed");
                }
                self.writer = None;
                self.state = LinkState::Disconnected;
                None
            }
        }
    }

    /// Send a control message over the current connection. Dropped with a
    /// warning while disconnected.
    pub fn send_control(&mut self, msg: &ControlMessage) -> Result<(), ConnError> {
        let Some(writer) = self.writer.as_mut() else {
            warn!(?msg, "not connected, control message dropped");
            return Ok(());
        };
        writer.send_control(msg)
    }

    /// Close the connection without reconnecting until the next tick.
    pub fn close(&mut self) {
        self.drop_connection();
        self.generation += 1;
        self.state = LinkState::Disconnected;
    }

    fn drop_connection(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.shutdown();
        }
    }

    fn spawn_attempt(&mut self) {
        self.state = LinkState::Connecting;
        self.attempts += 1;
        let generation = self.generation;
        let hostname = self.hostname.clone();
        let port = self.port;
        let timeout = self.connect_timeout;
        let max = self.max_message_bytes;
        let events = self.events.clone();
        debug!(addr = %format!("{hostname}:{port}"), generation, "connect attempt");

        thread::spawn(move || {
            let conn = Connection::connect_timeout(&hostname, port, timeout)
                .and_then(|conn| {
                    let writer = conn.writer()?;
                    Ok((conn.with_max_message(max), writer))
                });
            let mut conn = match conn {
                Ok((conn, writer)) => {
                    let peer = conn.peer_addr().ok();
                    if events.send(LinkEvent::Connected { generation, peer, writer }).is_err() {
                        return;
                    }
                    conn
                }
                Err(e) => {
                    let _ = events.send(LinkEvent::Closed { generation, reason: e.to_string() });
                    return;
                }
            };
            loop {
                match conn.recv() {
                    Ok(bytes) => {
                        if events.send(LinkEvent::Frame { generation, bytes }).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = events.send(LinkEvent::Closed { generation, reason: e.to_string() });
                        return;
                    }
                }
            }
        });
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.drop_connection();
    }
}
