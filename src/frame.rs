//! Telemetry frame model and its wire decoder/encoder.
//!
//! Wire layout (one byte order throughout, sniffed from the sentinel):
//! ```text
//! SENTINEL(u32=42)
//! HEADER   9×u32 counts, angle_min f32, angle_max f32, fallback x/y/theta f32
//! LASER    num_laser_rays × u16            (millimetres)
//! PARTICLE num_particles × (x, y, theta)   3×f32
//! PATH     num_path_options × (c, d, clr)  3×f32
//! POINT    num_points × (x, y, color)      2×f32 + u32
//! LINE     num_lines × (p0, p1, color)     4×f32 + u32
//! ARC      num_arcs × (c, r, a0, a1, col)  5×f32 + u32
//! ```

use serde::Serialize;

use crate::codec::{Endian, Reader, Writer};
use crate::error::{DecodeError, Result};
use crate::geometry::Rgb;
use crate::pose::{Point2, Pose2};

/// Value of the leading 32-bit sentinel in every telemetry frame.
pub const SENTINEL: u32 = 42;

/// Raw laser units per meter.
pub const LASER_UNITS_PER_METER: f32 = 1000.0;

const HEADER_SIZE: usize = 9 * 4 + 5 * 4;
const LASER_RECORD: usize = 2;
const PARTICLE_RECORD: usize = 3 * 4;
const PATH_RECORD: usize = 3 * 4;
const POINT_RECORD: usize = 2 * 4 + 4;
const LINE_RECORD: usize = 4 * 4 + 4;
const ARC_RECORD: usize = 5 * 4 + 4;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Packed wire color, `0xRRGGBB` in the low 24 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> Rgb {
        Rgb::from_packed(self.0)
    }
}

/// Per-frame counts, laser range and the fallback pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameHeader {
    pub num_particles: u32,
    pub num_path_options: u32,
    pub num_points: u32,
    pub num_lines: u32,
    pub num_arcs: u32,
    pub num_laser_rays: u32,
    pub num_local_points: u32,
    pub num_local_lines: u32,
    pub num_local_arcs: u32,
    pub angle_min: f32,
    pub angle_max: f32,
    /// Pose reported by the robot itself. Non-finite components mean unset.
    pub fallback_pose: Pose2,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            num_particles: 0,
            num_path_options: 0,
            num_points: 0,
            num_lines: 0,
            num_arcs: 0,
            num_laser_rays: 0,
            num_local_points: 0,
            num_local_lines: 0,
            num_local_arcs: 0,
            angle_min: 0.0,
            angle_max: 0.0,
            fallback_pose: Pose2::new(f32::NAN, f32::NAN, f32::NAN),
        }
    }
}

impl FrameHeader {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let header = Self {
            num_particles: r.read_u32("num_particles")?,
            num_path_options: r.read_u32("num_path_options")?,
            num_points: r.read_u32("num_points")?,
            num_lines: r.read_u32("num_lines")?,
            num_arcs: r.read_u32("num_arcs")?,
            num_laser_rays: r.read_u32("num_laser_rays")?,
            num_local_points: r.read_u32("num_local_points")?,
            num_local_lines: r.read_u32("num_local_lines")?,
            num_local_arcs: r.read_u32("num_local_arcs")?,
            angle_min: r.read_f32("angle_min")?,
            angle_max: r.read_f32("angle_max")?,
            fallback_pose: Pose2 {
                x: r.read_f32("fallback_x")?,
                y: r.read_f32("fallback_y")?,
                theta: r.read_f32("fallback_theta")?,
            },
        };
        for (kind, local, total) in [
            ("point", header.num_local_points, header.num_points),
            ("line", header.num_local_lines, header.num_lines),
            ("arc", header.num_local_arcs, header.num_arcs),
        ] {
            if local > total {
                return Err(DecodeError::LocalCountExceedsTotal { kind, local, total });
            }
        }
        Ok(header)
    }

    fn encode(&self, w: &mut Writer) {
        for count in [
            self.num_particles,
            self.num_path_options,
            self.num_points,
            self.num_lines,
            self.num_arcs,
            self.num_laser_rays,
            self.num_local_points,
            self.num_local_lines,
            self.num_local_arcs,
        ] {
            w.write_u32(count);
        }
        w.write_f32(self.angle_min);
        w.write_f32(self.angle_max);
        w.write_f32(self.fallback_pose.x);
        w.write_f32(self.fallback_pose.y);
        w.write_f32(self.fallback_pose.theta);
    }
}

/// Planar laser scan. Always robot-local.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaserScan {
    pub angle_min: f32,
    pub angle_max: f32,
    /// Ranges in meters, evenly spaced over `[angle_min, angle_max)`.
    pub ranges: Vec<f32>,
}

/// A candidate local path evaluated by the planner. Always robot-local.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PathOption {
    pub curvature: f32,
    pub distance: f32,
    pub clearance: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ColoredPoint {
    pub position: Point2,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Line {
    pub p0: Point2,
    pub p1: Point2,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f32,
    pub start_angle: f32,
    pub end_angle: f32,
    pub color: Color,
}

/// One decoded tick of telemetry. Immutable once decoded.
///
/// Invariant: each header count equals the length of its sequence, and each
/// local count is at most its total. The first `num_local_*` points, lines
/// and arcs are robot-local; the rest are already in the world frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub header: FrameHeader,
    pub laser: LaserScan,
    pub particles: Vec<Pose2>,
    pub path_options: Vec<PathOption>,
    pub points: Vec<ColoredPoint>,
    pub lines: Vec<Line>,
    pub arcs: Vec<Arc>,
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

impl TelemetryFrame {
    /// Decode one complete frame.
    ///
    /// Fields are read strictly in wire order by a single cursor. Any read
    /// past the end fails the whole decode with
    /// [`DecodeError::BufferUnderrun`]. Trailing bytes after the last arc are
    /// ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data, Endian::sniff(data));

        let sentinel = r.read_u32("sentinel")?;
        if sentinel != SENTINEL {
            return Err(DecodeError::BadSentinel { got: sentinel });
        }

        let header = FrameHeader::decode(&mut r)?;

        let ranges = read_records(&mut r, "laser", header.num_laser_rays, LASER_RECORD, |r| {
            Ok(f32::from(r.read_u16("laser_range")?) / LASER_UNITS_PER_METER)
        })?;

        let particles = read_records(&mut r, "particles", header.num_particles, PARTICLE_RECORD, |r| {
            Ok(Pose2 {
                x: r.read_f32("particle_x")?,
                y: r.read_f32("particle_y")?,
                theta: r.read_f32("particle_theta")?,
            })
        })?;

        let path_options =
            read_records(&mut r, "path_options", header.num_path_options, PATH_RECORD, |r| {
                Ok(PathOption {
                    curvature: r.read_f32("path_curvature")?,
                    distance: r.read_f32("path_distance")?,
                    clearance: r.read_f32("path_clearance")?,
                })
            })?;

        let points = read_records(&mut r, "points", header.num_points, POINT_RECORD, |r| {
            Ok(ColoredPoint {
                position: read_point(r, "point")?,
                color: Color(r.read_u32("point_color")?),
            })
        })?;

        let lines = read_records(&mut r, "lines", header.num_lines, LINE_RECORD, |r| {
            Ok(Line {
                p0: read_point(r, "line_p0")?,
                p1: read_point(r, "line_p1")?,
                color: Color(r.read_u32("line_color")?),
            })
        })?;

        let arcs = read_records(&mut r, "arcs", header.num_arcs, ARC_RECORD, |r| {
            Ok(Arc {
                center: read_point(r, "arc_center")?,
                radius: r.read_f32("arc_radius")?,
                start_angle: r.read_f32("arc_start_angle")?,
                end_angle: r.read_f32("arc_end_angle")?,
                color: Color(r.read_u32("arc_color")?),
            })
        })?;

        Ok(Self {
            laser: LaserScan {
                angle_min: header.angle_min,
                angle_max: header.angle_max,
                ranges,
            },
            header,
            particles,
            path_options,
            points,
            lines,
            arcs,
        })
    }
}

fn read_point(r: &mut Reader<'_>, field: &'static str) -> Result<Point2> {
    Ok(Point2 { x: r.read_f32(field)?, y: r.read_f32(field)? })
}

/// Read `count` fixed-size records, checking up front that they fit.
fn read_records<T>(
    r: &mut Reader<'_>,
    field: &'static str,
    count: u32,
    record_size: usize,
    mut read: impl FnMut(&mut Reader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = count as usize;
    r.require(field, count, record_size)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read(r)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

impl TelemetryFrame {
    /// Rewrite the header counts to match the sequences, clamping local
    /// counts to their totals. The laser angles are taken from the scan.
    pub fn with_counts_from_contents(mut self) -> Self {
        let h = &mut self.header;
        h.num_particles = self.particles.len() as u32;
        h.num_path_options = self.path_options.len() as u32;
        h.num_points = self.points.len() as u32;
        h.num_lines = self.lines.len() as u32;
        h.num_arcs = self.arcs.len() as u32;
        h.num_laser_rays = self.laser.ranges.len() as u32;
        h.num_local_points = h.num_local_points.min(h.num_points);
        h.num_local_lines = h.num_local_lines.min(h.num_lines);
        h.num_local_arcs = h.num_local_arcs.min(h.num_arcs);
        h.angle_min = self.laser.angle_min;
        h.angle_max = self.laser.angle_max;
        self
    }

    /// Encode into the wire layout in the given byte order.
    ///
    /// The header is written as-is; call [`with_counts_from_contents`]
    /// first if the counts may be stale. Laser ranges are rounded to whole
    /// millimetres and saturate at the u16 range.
    ///
    /// [`with_counts_from_contents`]: Self::with_counts_from_contents
    pub fn encode(&self, endian: Endian) -> Vec<u8> {
        let size = 4
            + HEADER_SIZE
            + self.laser.ranges.len() * LASER_RECORD
            + self.particles.len() * PARTICLE_RECORD
            + self.path_options.len() * PATH_RECORD
            + self.points.len() * POINT_RECORD
            + self.lines.len() * LINE_RECORD
            + self.arcs.len() * ARC_RECORD;
        let mut w = Writer::with_capacity(endian, size);

        w.write_u32(SENTINEL);
        self.header.encode(&mut w);

        for &range in &self.laser.ranges {
            let raw = (range * LASER_UNITS_PER_METER).round().clamp(0.0, f32::from(u16::MAX));
            w.write_u16(raw as u16);
        }
        for p in &self.particles {
            w.write_f32(p.x);
            w.write_f32(p.y);
            w.write_f32(p.theta);
        }
        for path in &self.path_options {
            w.write_f32(path.curvature);
            w.write_f32(path.distance);
            w.write_f32(path.clearance);
        }
        for p in &self.points {
            write_point(&mut w, p.position);
            w.write_u32(p.color.0);
        }
        for line in &self.lines {
            write_point(&mut w, line.p0);
            write_point(&mut w, line.p1);
            w.write_u32(line.color.0);
        }
        for arc in &self.arcs {
            write_point(&mut w, arc.center);
            w.write_f32(arc.radius);
            w.write_f32(arc.start_angle);
            w.write_f32(arc.end_angle);
            w.write_u32(arc.color.0);
        }
        w.into_bytes()
    }
}

fn write_point(w: &mut Writer, p: Point2) {
    w.write_f32(p.x);
    w.write_f32(p.y);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
