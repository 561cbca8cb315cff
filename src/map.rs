//! Static world map: wall segments loaded by name.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::GeometryBuffer;
use crate::pose::Point2;

/// Map name that clears the map layer.
pub const MAP_BLANK: &str = "--blank--";

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid map {name:?}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid map name {0:?}")]
    InvalidName(String),
}

/// One wall segment, stored as `{"p0":{"x":..,"y":..},"p1":{..}}`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WallSegment {
    pub p0: Point2,
    pub p1: Point2,
}

/// Parse a map document (a JSON array of segments).
pub fn parse_segments(name: &str, json: &str) -> Result<Vec<WallSegment>, MapError> {
    serde_json::from_str(json).map_err(|source| MapError::Parse { name: name.to_string(), source })
}

/// Load `{dir}/{name}.json`. [`MAP_BLANK`] yields an empty map.
pub fn load(dir: &Path, name: &str) -> Result<Vec<WallSegment>, MapError> {
    if name == MAP_BLANK {
        return Ok(Vec::new());
    }
    // Names select a file inside `dir`; nothing may escape it.
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(MapError::InvalidName(name.to_string()));
    }
    let path = dir.join(format!("{name}.json"));
    let json = fs::read_to_string(&path)
        .map_err(|source| MapError::Io { name: name.to_string(), source })?;
    parse_segments(name, &json)
}

/// Replace the map layer with `segments` and commit it.
pub fn write_segments(segments: &[WallSegment], buf: &mut GeometryBuffer) {
    buf.set_size(segments.len() * 2);
    for (i, s) in segments.iter().enumerate() {
        buf.write_position(2 * i, s.p0.x, s.p0.y, 0.0);
        buf.write_position(2 * i + 1, s.p1.x, s.p1.y, 0.0);
    }
    buf.commit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    const GDC: &str = r#"[
        {"p0": {"x": 0.0, "y": 0.0}, "p1": {"x": 4.0, "y": 0.0}},
        {"p0": {"x": 4.0, "y": 0.0}, "p1": {"x": 4.0, "y": 3.0}}
    ]"#;

    #[test]
    fn parses_segment_array() {
        let segs = parse_segments("gdc", GDC).unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[1].p1, Point2::new(4.0, 3.0));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(parse_segments("bad", "{\"p0\": 1}"), Err(MapError::Parse { .. })));
    }

    #[test]
    fn blank_map_needs_no_file() {
        assert!(load(Path::new("/nonexistent"), MAP_BLANK).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(load(Path::new("/nonexistent"), "GDC1"), Err(MapError::Io { .. })));
    }

    #[test]
    fn names_cannot_escape_the_map_dir() {
        for name in ["../secrets", "a/b", "", ".hidden"] {
            assert!(matches!(load(Path::new("maps"), name), Err(MapError::InvalidName(_))));
        }
    }

    #[test]
    fn loads_from_directory() {
        let dir = std::env::temp_dir().join(format!("roboscope-map-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("GDC1.json"), GDC).unwrap();
        let segs = load(&dir, "GDC1").unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(segs.len(), 2);
    }

    #[test]
    fn writes_two_vertices_per_segment() {
        let mut buf = GeometryBuffer::new(Primitive::LineSegments);
        write_segments(&parse_segments("gdc", GDC).unwrap(), &mut buf);
        assert_eq!(buf.size(), 4);
        assert_eq!(buf.positions()[3], [4.0, 3.0, 0.0]);
        assert_eq!(buf.version(), 1);
    }
}
