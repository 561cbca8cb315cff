//! Scene synchronization: the single owner of every layer buffer.
//!
//! [`SceneSync`] turns inbound frame bytes into committed geometry and
//! keeps the replay history. It is driven from one loop; each call runs
//! decode, pose estimation and transform to completion, so a renderer
//! never observes a half-written frame.
//!
//! ```text
//!            TogglePause
//!   Live  ───────────────>  Paused { offset }
//!    ^    <───────────────    |  SetScrubOffset(n): re-render replay[n]
//!    |       TogglePause      |  inbound frames: dropped, not decoded
//!    └ inbound frames: decode, render, push to replay
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{Palette, ViewerConfig};
use crate::control::ControlMessage;
use crate::error::DecodeError;
use crate::frame::TelemetryFrame;
use crate::intent::Intent;
use crate::map::{self, MapError};
use crate::pose::{self, Pose2};
use crate::replay::ReplayBuffer;
use crate::transform::{self, SceneLayers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Live,
    /// Showing `replay.get(offset)`.
    Paused { offset: usize },
}

/// Running counters, logged periodically by the viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Every inbound message, including dropped ones.
    pub received: u64,
    pub accepted: u64,
    pub dropped_paused: u64,
    pub dropped_backlog: u64,
    pub decode_errors: u64,
    /// Accepted or replayed frames rendered without a pose.
    pub pose_unavailable: u64,
    pub scrubs: u64,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Accepted,
    DroppedPaused,
    /// Skipped because newer messages were already queued.
    DroppedBacklog,
    Rejected(DecodeError),
}

pub struct SceneSync {
    state: SyncState,
    layers: SceneLayers,
    replay: ReplayBuffer,
    current: Option<Arc<TelemetryFrame>>,
    pose: Option<Pose2>,
    /// Whether the last rendered frame had a pose; `true` before any frame.
    pose_available: bool,
    stats: SyncStats,
    maps_dir: PathBuf,
    map_name: Option<String>,
    palette: Palette,
}

impl SceneSync {
    /// Empty scene in the `Live` state. No map is loaded until
    /// [`load_map`](Self::load_map) is called.
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            state: SyncState::Live,
            layers: SceneLayers::new(config.layers.clone()),
            replay: ReplayBuffer::new(config.replay_capacity),
            current: None,
            pose: None,
            pose_available: true,
            stats: SyncStats::default(),
            maps_dir: config.maps_dir.clone(),
            map_name: None,
            palette: config.palette.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Inbound frames
    // -----------------------------------------------------------------------

    /// Handle one inbound message.
    ///
    /// While paused the bytes are dropped before any decode. A frame that
    /// fails to decode leaves every buffer exactly as it was.
    pub fn on_frame(&mut self, bytes: &[u8]) -> FrameOutcome {
        self.stats.received += 1;
        if let SyncState::Paused { .. } = self.state {
            self.stats.dropped_paused += 1;
            trace!(len = bytes.len(), "paused, frame dropped");
            return FrameOutcome::DroppedPaused;
        }

        let frame = match TelemetryFrame::decode(bytes) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(error = %e, len = bytes.len(), "rejected telemetry frame");
                return FrameOutcome::Rejected(e);
            }
        };

        self.render(&frame);
        self.replay.push(Arc::clone(&frame));
        self.current = Some(frame);
        self.stats.accepted += 1;
        FrameOutcome::Accepted
    }

    /// Count a message skipped because newer ones were queued behind it.
    /// While paused the message is counted as a paused drop instead.
    pub fn record_backlog_drop(&mut self) -> FrameOutcome {
        self.stats.received += 1;
        if self.is_paused() {
            self.stats.dropped_paused += 1;
            return FrameOutcome::DroppedPaused;
        }
        self.stats.dropped_backlog += 1;
        trace!("stale frame skipped");
        FrameOutcome::DroppedBacklog
    }

    fn render(&mut self, frame: &TelemetryFrame) {
        let pose = pose::estimate(frame);
        match pose {
            Some(_) => {
                if !self.pose_available {
                    info!("pose available again");
                }
                self.pose_available = true;
            }
            None => {
                self.stats.pose_unavailable += 1;
                if self.pose_available {
                    warn!("pose unavailable, drawing robot-local geometry untransformed");
                } else {
                    debug!("pose unavailable");
                }
                self.pose_available = false;
            }
        }
        transform::apply(frame, pose, &mut self.layers);
        self.pose = pose;
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Apply a user intent. Pose and goal intents are not scene state; they
    /// come back as control messages for the robot.
    pub fn apply_intent(&mut self, intent: Intent) -> Option<ControlMessage> {
        match intent {
            Intent::TogglePause => {
                self.toggle_pause();
                None
            }
            Intent::SetScrubOffset(steps_back) => {
                self.scrub(steps_back);
                None
            }
            Intent::SetMapName(name) => {
                if let Err(e) = self.load_map(&name) {
                    warn!(error = %e, "map not changed");
                }
                None
            }
            Intent::ToggleLayerVisible(layer) => {
                let visible = self.layers.visibility.toggle(layer);
                info!(%layer, visible, "layer visibility");
                None
            }
            Intent::SetInitialPose(p) => Some(ControlMessage::set_initial_pose(p)),
            Intent::SetNavGoal(p) => Some(ControlMessage::set_nav_goal(p)),
        }
    }

    fn toggle_pause(&mut self) {
        self.state = match self.state {
            SyncState::Live => {
                info!(history = self.replay.len(), "paused");
                SyncState::Paused { offset: 0 }
            }
            SyncState::Paused { .. } => {
                info!("live");
                SyncState::Live
            }
        };
    }

    /// Re-render the frame `steps_back` from the newest. Offsets past the
    /// oldest frame are clamped. Ignored while live.
    fn scrub(&mut self, steps_back: usize) {
        let SyncState::Paused { .. } = self.state else {
            debug!(steps_back, "scrub ignored while live");
            return;
        };
        let Some(frame) = self.replay.get(steps_back).cloned() else {
            debug!("scrub with empty history");
            return;
        };
        let offset = steps_back.min(self.replay.len() - 1);
        self.state = SyncState::Paused { offset };
        self.stats.scrubs += 1;
        debug!(offset, "scrub");
        self.render(&frame);
        self.current = Some(frame);
    }

    /// Load a map by name into the map layer. On failure the previous map
    /// stays in place.
    pub fn load_map(&mut self, name: &str) -> Result<(), MapError> {
        let segments = map::load(&self.maps_dir, name)?;
        map::write_segments(&segments, &mut self.layers.map);
        info!(map = name, segments = segments.len(), "map loaded");
        self.map_name = Some(name.to_string());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, SyncState::Paused { .. })
    }

    pub fn layers(&self) -> &SceneLayers {
        &self.layers
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    /// The frame currently on display.
    pub fn current_frame(&self) -> Option<&Arc<TelemetryFrame>> {
        self.current.as_ref()
    }

    /// Pose used for the frame on display.
    pub fn pose(&self) -> Option<Pose2> {
        self.pose
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn map_name(&self) -> Option<&str> {
        self.map_name.as_deref()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }
}
