pub mod capture;
pub mod codec;
pub mod config;
pub mod conn;
pub mod control;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod intent;
pub mod link;
pub mod map;
pub mod pose;
pub mod replay;
pub mod scene;
pub mod synth;
pub mod transform;

pub use config::{ConfigError, ViewerConfig};
pub use conn::{ConnError, Connection, MessageWriter};
pub use control::ControlMessage;
pub use error::DecodeError;
pub use frame::TelemetryFrame;
pub use geometry::{GeometryBuffer, Rgb};
pub use intent::{Intent, IntentParseError};
pub use link::{Link, LinkEvent, LinkState};
pub use pose::{Point2, Pose2};
pub use replay::ReplayBuffer;
pub use scene::{FrameOutcome, SceneSync, SyncState, SyncStats};
pub use transform::{Layer, LayerVisibility, SceneLayers};
