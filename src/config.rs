//! Viewer configuration.
//!
//! Loaded from an optional JSON file; every field has a default so a
//! partial file (or none at all) is valid. Binaries apply CLI overrides on
//! top and then call [`ViewerConfig::validate`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conn::{DEFAULT_HOST, DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_PORT};
use crate::geometry::Rgb;
use crate::replay;
use crate::transform::{Layer, LayerVisibility};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub max_message_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 2000,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Packed `0xRRGGBB` colors for the background and single-colored layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: u32,
    pub point_cloud: u32,
    pub laser: u32,
    pub walls: u32,
    pub particles: u32,
    pub robot: u32,
    pub paths: u32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: 0x201819,
            point_cloud: 0x20dd80,
            laser: 0xdd8020,
            walls: 0x2080dd,
            particles: 0xdddd20,
            robot: 0xffffff,
            paths: 0x808080,
        }
    }
}

impl Palette {
    /// Uniform color for a layer, `None` for layers colored per vertex.
    pub fn layer_color(&self, layer: Layer) -> Option<Rgb> {
        let packed = match layer {
            Layer::Laser => self.laser,
            Layer::Map => self.walls,
            Layer::Particles => self.particles,
            Layer::Robot => self.robot,
            Layer::Paths => self.paths,
            Layer::Points | Layer::Lines | Layer::Arcs => return None,
        };
        Some(Rgb::from_packed(packed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub connection: ConnectionConfig,
    pub watchdog_period_ms: u64,
    pub replay_capacity: usize,
    pub map_name: String,
    pub maps_dir: PathBuf,
    pub layers: LayerVisibility,
    pub palette: Palette,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            watchdog_period_ms: 500,
            replay_capacity: replay::DEFAULT_CAPACITY,
            map_name: "GDC1".to_string(),
            maps_dir: PathBuf::from("maps"),
            layers: LayerVisibility::default(),
            palette: Palette::default(),
        }
    }
}

impl ViewerConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay_capacity == 0 {
            return Err(ConfigError::Invalid("replay_capacity must be at least 1"));
        }
        if self.watchdog_period_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_period_ms must be at least 1"));
        }
        if self.connection.max_message_bytes == 0 {
            return Err(ConfigError::Invalid("max_message_bytes must be at least 1"));
        }
        if self.connection.hostname.is_empty() {
            return Err(ConfigError::Invalid("hostname must not be empty"));
        }
        Ok(())
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.connection.hostname, "localhost");
        assert_eq!(config.connection.port, 10272);
        assert_eq!(config.watchdog_period(), Duration::from_millis(500));
        assert_eq!(config.replay_capacity, 40);
        assert_eq!(config.map_name, "GDC1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ViewerConfig = serde_json::from_str(
            r#"{"connection": {"port": 9000}, "layers": {"laser": false}, "replay_capacity": 10}"#,
        )
        .unwrap();
        assert_eq!(config.connection.port, 9000);
        assert_eq!(config.connection.hostname, "localhost");
        assert!(!config.layers.laser);
        assert!(config.layers.points);
        assert_eq!(config.replay_capacity, 10);
        assert_eq!(config.palette, Palette::default());
    }

    #[test]
    fn rejects_zero_capacity_and_period() {
        let mut config = ViewerConfig { replay_capacity: 0, ..ViewerConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.replay_capacity = 1;
        config.watchdog_period_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reports_path() {
        let err = ViewerConfig::load(Path::new("/nonexistent/roboscope.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/roboscope.json"));
    }

    #[test]
    fn palette_colors() {
        let palette = Palette::default();
        assert_eq!(palette.layer_color(Layer::Laser), Some(Rgb::from_packed(0xdd8020)));
        assert_eq!(palette.layer_color(Layer::Map), Some(Rgb::from_packed(0x2080dd)));
        assert_eq!(palette.layer_color(Layer::Points), None);
    }
}
