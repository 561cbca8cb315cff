//! Synthetic telemetry for running the viewer without a robot.

use std::f32::consts::{FRAC_PI_2, TAU};

use crate::frame::{Color, ColoredPoint, LaserScan, Line, PathOption, TelemetryFrame};
use crate::pose::{Point2, Pose2};

const PARTICLES: usize = 64;
const LASER_RAYS: usize = 181;
const ORBIT_RADIUS: f32 = 2.0;
/// Radians of orbit per frame.
const ORBIT_STEP: f32 = 0.02;

/// Frame `n` of a robot circling the origin: a particle cloud around the
/// true pose, a laser sweep, three candidate paths, a local marker and the
/// orbit drawn as a world-frame line.
pub fn frame(n: u64) -> TelemetryFrame {
    let phase = (n as f32 * ORBIT_STEP) % TAU;
    let pose = Pose2::new(ORBIT_RADIUS * phase.cos(), ORBIT_RADIUS * phase.sin(), phase + FRAC_PI_2);

    let particles = (0..PARTICLES)
        .map(|i| {
            let (dx, dy, dt) = (jitter(n, i, 0), jitter(n, i, 1), jitter(n, i, 2));
            Pose2::new(pose.x + 0.15 * dx, pose.y + 0.15 * dy, pose.theta + 0.05 * dt)
        })
        .collect();

    let ranges = (0..LASER_RAYS)
        .map(|i| 2.5 + 0.5 * (i as f32 * 0.1 + phase * 4.0).sin())
        .collect();

    let path_options = [-1.0, 0.0, 1.0]
        .into_iter()
        .map(|c| PathOption { curvature: c, distance: 1.5, clearance: 0.3 })
        .collect();

    let points = vec![ColoredPoint { position: Point2::new(1.0, 0.0), color: Color(0xff2020) }];

    let lines = vec![Line {
        p0: Point2::new(-ORBIT_RADIUS, 0.0),
        p1: Point2::new(ORBIT_RADIUS, 0.0),
        color: Color(0x808080),
    }];

    let mut frame = TelemetryFrame {
        laser: LaserScan { angle_min: -FRAC_PI_2, angle_max: FRAC_PI_2, ranges },
        particles,
        path_options,
        points,
        lines,
        ..TelemetryFrame::default()
    };
    frame.header.num_local_points = 1;
    frame.header.fallback_pose = pose;
    frame.with_counts_from_contents()
}

/// Deterministic value in [-1, 1] for particle `i`, axis `k` of frame `n`.
fn jitter(n: u64, i: usize, k: usize) -> f32 {
    let seed = (n as f32) * 12.9898 + (i as f32) * 78.233 + (k as f32) * 37.719;
    (seed.sin() * 43758.547).rem_euclid(1.0) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use crate::pose;
    use approx::assert_abs_diff_eq;

    #[test]
    fn frames_decode_with_a_pose_near_the_orbit() {
        for n in [0, 1, 500] {
            let f = frame(n);
            let decoded = TelemetryFrame::decode(&f.encode(Endian::Little)).unwrap();
            assert_eq!(decoded.particles.len(), PARTICLES);
            assert_eq!(decoded.laser.ranges.len(), LASER_RAYS);
            let p = pose::estimate(&decoded).unwrap();
            assert_abs_diff_eq!(p.x.hypot(p.y), ORBIT_RADIUS, epsilon = 0.2);
        }
    }

    #[test]
    fn jitter_is_bounded_and_deterministic() {
        for i in 0..PARTICLES {
            let v = jitter(7, i, 1);
            assert!((-1.0..=1.0).contains(&v));
            assert_eq!(v, jitter(7, i, 1));
        }
    }
}
