//! Frame-to-scene transform: writes world-frame vertices into the layer
//! buffers.
//!
//! One rigid transform `T` (the estimated robot pose, or identity when there
//! is none) maps robot-local geometry into the world frame. Laser rays and
//! path options are always local; points, lines and arcs are local only
//! below their `num_local_*` index. Particles are drawn with their own poses.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::TelemetryFrame;
use crate::geometry::{GeometryBuffer, Primitive, Rgb};
use crate::pose::{Point2, Pose2};

/// Forward displacement of the laser from the robot origin (local x).
pub const LASER_OFFSET_X: f32 = 0.2;
/// Line segments per sampled path option.
pub const PATH_SEGMENTS: usize = 32;
/// Line segments per sampled arc.
pub const ARC_SEGMENTS: usize = 16;
/// Curvatures at or below this magnitude are drawn as straight paths.
pub const CURVATURE_EPSILON: f32 = 1e-5;

/// Robot silhouette as segment endpoint pairs: a unit shaft with an
/// arrowhead at local (1, 0).
pub const ROBOT_GLYPH: [(Point2, Point2); 3] = [
    (Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)),
    (Point2::new(1.0, 0.0), Point2::new(0.7, -0.3)),
    (Point2::new(1.0, 0.0), Point2::new(0.7, 0.3)),
];

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// A rendered layer of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Points,
    Lines,
    Arcs,
    Paths,
    Laser,
    Particles,
    Robot,
    Map,
}

impl Layer {
    pub const ALL: [Layer; 8] = [
        Layer::Points,
        Layer::Lines,
        Layer::Arcs,
        Layer::Paths,
        Layer::Laser,
        Layer::Particles,
        Layer::Robot,
        Layer::Map,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Points => "points",
            Layer::Lines => "lines",
            Layer::Arcs => "arcs",
            Layer::Paths => "paths",
            Layer::Laser => "laser",
            Layer::Particles => "particles",
            Layer::Robot => "robot",
            Layer::Map => "map",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown layer {s:?}"))
    }
}

/// Per-layer visibility flags. Hidden layers are still kept up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerVisibility {
    pub points: bool,
    pub lines: bool,
    pub arcs: bool,
    pub paths: bool,
    pub laser: bool,
    pub particles: bool,
    pub robot: bool,
    pub map: bool,
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self {
            points: true,
            lines: true,
            arcs: true,
            paths: true,
            laser: true,
            particles: true,
            robot: true,
            map: true,
        }
    }
}

impl LayerVisibility {
    fn flag_mut(&mut self, layer: Layer) -> &mut bool {
        match layer {
            Layer::Points => &mut self.points,
            Layer::Lines => &mut self.lines,
            Layer::Arcs => &mut self.arcs,
            Layer::Paths => &mut self.paths,
            Layer::Laser => &mut self.laser,
            Layer::Particles => &mut self.particles,
            Layer::Robot => &mut self.robot,
            Layer::Map => &mut self.map,
        }
    }

    pub fn is_visible(&self, layer: Layer) -> bool {
        match layer {
            Layer::Points => self.points,
            Layer::Lines => self.lines,
            Layer::Arcs => self.arcs,
            Layer::Paths => self.paths,
            Layer::Laser => self.laser,
            Layer::Particles => self.particles,
            Layer::Robot => self.robot,
            Layer::Map => self.map,
        }
    }

    /// Flip a layer's flag, returning the new state.
    pub fn toggle(&mut self, layer: Layer) -> bool {
        let flag = self.flag_mut(layer);
        *flag = !*flag;
        *flag
    }
}

/// The full set of layer buffers, owned by the scene.
#[derive(Debug, Clone)]
pub struct SceneLayers {
    pub points: GeometryBuffer,
    pub lines: GeometryBuffer,
    pub arcs: GeometryBuffer,
    pub paths: GeometryBuffer,
    pub laser: GeometryBuffer,
    pub particles: GeometryBuffer,
    pub robot: GeometryBuffer,
    pub map: GeometryBuffer,
    pub visibility: LayerVisibility,
}

impl SceneLayers {
    pub fn new(visibility: LayerVisibility) -> Self {
        Self {
            points: GeometryBuffer::colored(Primitive::Points),
            lines: GeometryBuffer::colored(Primitive::LineSegments),
            arcs: GeometryBuffer::colored(Primitive::LineSegments),
            paths: GeometryBuffer::new(Primitive::LineSegments),
            laser: GeometryBuffer::new(Primitive::Points),
            particles: GeometryBuffer::new(Primitive::LineSegments),
            robot: GeometryBuffer::new(Primitive::LineSegments),
            map: GeometryBuffer::new(Primitive::LineSegments),
            visibility,
        }
    }

    pub fn get(&self, layer: Layer) -> &GeometryBuffer {
        match layer {
            Layer::Points => &self.points,
            Layer::Lines => &self.lines,
            Layer::Arcs => &self.arcs,
            Layer::Paths => &self.paths,
            Layer::Laser => &self.laser,
            Layer::Particles => &self.particles,
            Layer::Robot => &self.robot,
            Layer::Map => &self.map,
        }
    }
}

impl Default for SceneLayers {
    fn default() -> Self {
        Self::new(LayerVisibility::default())
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Rewrite every frame-driven layer from `frame`.
///
/// Each buffer is resized, fully written, then committed exactly once. The
/// map layer is static and left untouched.
pub fn apply(frame: &TelemetryFrame, pose: Option<Pose2>, layers: &mut SceneLayers) {
    let t = pose.unwrap_or_else(Pose2::identity);
    write_points(frame, &t, &mut layers.points);
    write_lines(frame, &t, &mut layers.lines);
    write_arcs(frame, &t, &mut layers.arcs);
    write_laser(frame, &t, &mut layers.laser);
    write_paths(frame, &t, &mut layers.paths);
    write_particles(frame, &mut layers.particles);
    write_robot(pose, &mut layers.robot);
}

fn write_points(frame: &TelemetryFrame, t: &Pose2, buf: &mut GeometryBuffer) {
    let num_local = frame.header.num_local_points as usize;
    buf.set_size(frame.points.len());
    for (i, p) in frame.points.iter().enumerate() {
        let pos = if i < num_local { t.transform_point(p.position) } else { p.position };
        buf.write_position(i, pos.x, pos.y, 0.0);
        buf.write_color(i, p.color.rgb());
    }
    buf.commit();
}

fn write_lines(frame: &TelemetryFrame, t: &Pose2, buf: &mut GeometryBuffer) {
    let num_local = frame.header.num_local_lines as usize;
    buf.set_size(frame.lines.len() * 2);
    for (i, line) in frame.lines.iter().enumerate() {
        let (p0, p1) = if i < num_local {
            (t.transform_point(line.p0), t.transform_point(line.p1))
        } else {
            (line.p0, line.p1)
        };
        write_segment(buf, i, p0, p1, Some(line.color.rgb()));
    }
    buf.commit();
}

fn write_arcs(frame: &TelemetryFrame, t: &Pose2, buf: &mut GeometryBuffer) {
    let num_local = frame.header.num_local_arcs as usize;
    buf.set_size(frame.arcs.len() * ARC_SEGMENTS * 2);
    for (i, arc) in frame.arcs.iter().enumerate() {
        let sweep = arc.end_angle - arc.start_angle;
        let sample = |k: usize| {
            let a = arc.start_angle + sweep * k as f32 / ARC_SEGMENTS as f32;
            let p = Point2::new(
                arc.center.x + arc.radius * a.cos(),
                arc.center.y + arc.radius * a.sin(),
            );
            if i < num_local { t.transform_point(p) } else { p }
        };
        let color = arc.color.rgb();
        for k in 0..ARC_SEGMENTS {
            write_segment(buf, i * ARC_SEGMENTS + k, sample(k), sample(k + 1), Some(color));
        }
    }
    buf.commit();
}

fn write_laser(frame: &TelemetryFrame, t: &Pose2, buf: &mut GeometryBuffer) {
    let scan = &frame.laser;
    let n = scan.ranges.len();
    let span = scan.angle_max - scan.angle_min;
    buf.set_size(n);
    for (i, &r) in scan.ranges.iter().enumerate() {
        let theta = scan.angle_min + i as f32 / n as f32 * span;
        let local = Point2::new(theta.cos() * r + LASER_OFFSET_X, theta.sin() * r);
        let world = t.transform_point(local);
        buf.write_position(i, world.x, world.y, 0.0);
    }
    buf.commit();
}

fn write_paths(frame: &TelemetryFrame, t: &Pose2, buf: &mut GeometryBuffer) {
    buf.set_size(frame.path_options.len() * PATH_SEGMENTS * 2);
    for (i, path) in frame.path_options.iter().enumerate() {
        let samples = sample_path(path.curvature, path.distance);
        for (k, pair) in samples.windows(2).enumerate() {
            let a = t.transform_point(pair[0]);
            let b = t.transform_point(pair[1]);
            write_segment(buf, i * PATH_SEGMENTS + k, a, b, None);
        }
    }
    buf.commit();
}

/// Sample a constant-curvature path starting at the local origin heading
/// along +x, returning `PATH_SEGMENTS + 1` local points.
pub fn sample_path(curvature: f32, distance: f32) -> [Point2; PATH_SEGMENTS + 1] {
    let mut out = [Point2::default(); PATH_SEGMENTS + 1];
    let steps = PATH_SEGMENTS as f32;
    if curvature.abs() <= CURVATURE_EPSILON {
        for (k, p) in out.iter_mut().enumerate() {
            *p = Point2::new(distance * k as f32 / steps, 0.0);
        }
        return out;
    }

    let radius = 1.0 / curvature.abs();
    let sweep = (distance * curvature.abs()).min(TAU);
    // Left turns orbit a center at (0, r) starting from 3π/2; right turns
    // orbit (0, -r) ending at π/2. Either way the origin lies on the circle.
    let (center_y, start) = if curvature > 0.0 {
        (radius, 3.0 * FRAC_PI_2)
    } else {
        (-radius, FRAC_PI_2 - sweep)
    };
    for (k, p) in out.iter_mut().enumerate() {
        let a = start + sweep * k as f32 / steps;
        *p = Point2::new(radius * a.cos(), center_y + radius * a.sin());
    }
    out
}

fn write_particles(frame: &TelemetryFrame, buf: &mut GeometryBuffer) {
    buf.set_size(frame.particles.len() * ROBOT_GLYPH.len() * 2);
    for (i, particle) in frame.particles.iter().enumerate() {
        write_glyph(buf, i, particle);
    }
    buf.commit();
}

fn write_robot(pose: Option<Pose2>, buf: &mut GeometryBuffer) {
    match pose {
        Some(pose) => {
            buf.set_size(ROBOT_GLYPH.len() * 2);
            write_glyph(buf, 0, &pose);
        }
        None => buf.set_size(0),
    }
    buf.commit();
}

fn write_glyph(buf: &mut GeometryBuffer, index: usize, pose: &Pose2) {
    for (k, &(a, b)) in ROBOT_GLYPH.iter().enumerate() {
        write_segment(
            buf,
            index * ROBOT_GLYPH.len() + k,
            pose.transform_point(a),
            pose.transform_point(b),
            None,
        );
    }
}

/// Write segment `seg` as vertices `2·seg` and `2·seg + 1`.
fn write_segment(buf: &mut GeometryBuffer, seg: usize, a: Point2, b: Point2, color: Option<Rgb>) {
    let v = seg * 2;
    buf.write_position(v, a.x, a.y, 0.0);
    buf.write_position(v + 1, b.x, b.y, 0.0);
    if let Some(color) = color {
        buf.write_color(v, color);
        buf.write_color(v + 1, color);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::frame::{Color, ColoredPoint, FrameHeader, LaserScan, Line, PathOption};

    fn frame_with_points() -> TelemetryFrame {
        let points = [(1.0, 0.0), (0.0, 1.0), (3.5, -2.25), (-7.0, 4.0)]
            .into_iter()
            .map(|(x, y)| ColoredPoint { position: Point2::new(x, y), color: Color(0xFFFFFF) })
            .collect();
        TelemetryFrame {
            header: FrameHeader { num_local_points: 2, ..FrameHeader::default() },
            points,
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents()
    }

    #[test]
    fn only_local_points_are_transformed() {
        let frame = frame_with_points();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(10.0, -3.0, FRAC_PI_2)), &mut layers);

        let out = layers.points.positions();
        assert_abs_diff_eq!(out[0][0], 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[0][1], -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][0], 9.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][1], -3.0, epsilon = 1e-5);
        for i in 2..4 {
            let raw = frame.points[i].position;
            assert_eq!(out[i][0].to_bits(), raw.x.to_bits());
            assert_eq!(out[i][1].to_bits(), raw.y.to_bits());
        }
    }

    #[test]
    fn only_local_lines_are_transformed() {
        let line = Line { p0: Point2::new(0.0, 0.0), p1: Point2::new(1.0, 0.0), color: Color(0xFF0000) };
        let frame = TelemetryFrame {
            header: FrameHeader { num_local_lines: 1, ..FrameHeader::default() },
            lines: vec![line, line],
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(2.0, 2.0, 0.0)), &mut layers);

        let out = layers.lines.positions();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], [2.0, 2.0, 0.0]);
        assert_eq!(out[1], [3.0, 2.0, 0.0]);
        assert_eq!(out[2], [0.0, 0.0, 0.0]);
        assert_eq!(out[3], [1.0, 0.0, 0.0]);
        assert_eq!(layers.lines.colors().unwrap()[3], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn single_laser_ray_lands_past_sensor_offset() {
        let frame = TelemetryFrame {
            laser: LaserScan { angle_min: 0.0, angle_max: 0.0, ranges: vec![1.0] },
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, None, &mut layers);

        let out = layers.laser.positions();
        assert_eq!(out.len(), 1);
        assert_abs_diff_eq!(out[0][0], 1.2, epsilon = 1e-6);
        assert_abs_diff_eq!(out[0][1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn laser_rays_span_the_scan_and_follow_pose() {
        let frame = TelemetryFrame {
            laser: LaserScan { angle_min: 0.0, angle_max: PI, ranges: vec![1.0, 1.0] },
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(5.0, 0.0, 0.0)), &mut layers);

        // Ray 1 of 2 sits at π/2, not at angle_max.
        let out = layers.laser.positions();
        assert_abs_diff_eq!(out[0][0], 6.2, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][0], 5.2, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn straight_path_runs_along_x() {
        let samples = sample_path(0.0, 2.0);
        assert_eq!(samples[0], Point2::new(0.0, 0.0));
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].x, 2.0, epsilon = 1e-6);
        assert_eq!(samples[PATH_SEGMENTS].y, 0.0);
    }

    #[test]
    fn left_turn_starts_at_origin_and_curves_left() {
        // Quarter circle of radius 1.
        let samples = sample_path(1.0, FRAC_PI_2);
        assert_abs_diff_eq!(samples[0].x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(samples[0].y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn right_turn_ends_at_origin_and_curves_right() {
        let samples = sample_path(-1.0, FRAC_PI_2);
        assert_abs_diff_eq!(samples[0].x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(samples[0].y, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn path_sweep_is_capped_at_full_circle() {
        let samples = sample_path(2.0, 100.0);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].x, samples[0].x, epsilon = 1e-5);
        assert_abs_diff_eq!(samples[PATH_SEGMENTS].y, samples[0].y, epsilon = 1e-5);
    }

    #[test]
    fn paths_are_posed() {
        let frame = TelemetryFrame {
            path_options: vec![PathOption { curvature: 0.0, distance: 1.0, clearance: 0.0 }],
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(0.0, 0.0, FRAC_PI_2)), &mut layers);

        let out = layers.paths.positions();
        assert_eq!(out.len(), PATH_SEGMENTS * 2);
        let end = out[PATH_SEGMENTS * 2 - 1];
        assert_abs_diff_eq!(end[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(end[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn particles_use_their_own_pose() {
        let frame = TelemetryFrame {
            particles: vec![Pose2::new(5.0, 5.0, PI), Pose2::new(-1.0, 0.0, 0.0)],
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(100.0, 100.0, 0.0)), &mut layers);

        let out = layers.particles.positions();
        assert_eq!(out.len(), 2 * ROBOT_GLYPH.len() * 2);
        // First particle's shaft: (5,5) → (4,5).
        assert_abs_diff_eq!(out[0][0], 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][0], 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1][1], 5.0, epsilon = 1e-5);
        // Second particle's shaft starts at its own origin.
        assert_eq!(out[6], [-1.0, 0.0, 0.0]);
    }

    #[test]
    fn robot_glyph_hidden_without_pose() {
        let mut layers = SceneLayers::default();
        apply(&TelemetryFrame::default(), Some(Pose2::identity()), &mut layers);
        assert_eq!(layers.robot.size(), 6);
        apply(&TelemetryFrame::default(), None, &mut layers);
        assert_eq!(layers.robot.size(), 0);
    }

    #[test]
    fn local_arcs_are_posed() {
        use crate::frame::Arc;
        let arc = Arc {
            center: Point2::new(0.0, 0.0),
            radius: 1.0,
            start_angle: 0.0,
            end_angle: PI,
            color: Color(0x00FF00),
        };
        let frame = TelemetryFrame {
            header: FrameHeader { num_local_arcs: 1, ..FrameHeader::default() },
            arcs: vec![arc, arc],
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let mut layers = SceneLayers::default();
        apply(&frame, Some(Pose2::new(10.0, 0.0, 0.0)), &mut layers);

        let out = layers.arcs.positions();
        assert_eq!(out.len(), 2 * ARC_SEGMENTS * 2);
        assert_abs_diff_eq!(out[0][0], 11.0, epsilon = 1e-5);
        assert_abs_diff_eq!(out[ARC_SEGMENTS * 2][0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn every_frame_layer_commits_once() {
        let mut layers = SceneLayers::default();
        apply(&frame_with_points(), None, &mut layers);
        for layer in Layer::ALL {
            let expected = if layer == Layer::Map { 0 } else { 1 };
            assert_eq!(layers.get(layer).version(), expected, "{layer}");
        }
    }

    #[test]
    fn visibility_toggles() {
        let mut vis = LayerVisibility::default();
        assert!(!vis.toggle(Layer::Laser));
        assert!(!vis.is_visible(Layer::Laser));
        assert!(vis.is_visible(Layer::Points));
        assert_eq!("LASER".parse::<Layer>().unwrap(), Layer::Laser);
    }
}
