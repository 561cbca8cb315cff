//! Planar poses and robot pose estimation.
//!
//! Frame convention: x forward, y left, counter-clockwise positive heading,
//! angles in radians.

use serde::{Deserialize, Serialize};

use crate::frame::TelemetryFrame;

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 2D rigid pose: position plus heading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2 {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2 {
    pub const fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }

    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Map a point from this pose's local frame into the parent frame
    /// (rotate by `theta`, then translate by `(x, y)`).
    #[inline]
    pub fn transform_point(&self, p: Point2) -> Point2 {
        let (sin, cos) = self.theta.sin_cos();
        Point2 {
            x: self.x + p.x * cos - p.y * sin,
            y: self.y + p.x * sin + p.y * cos,
        }
    }
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Derive the robot pose for a frame.
///
/// With particles present, position is the arithmetic mean and heading the
/// circular mean (`atan2` of the mean sine and cosine), which stays correct
/// across the ±π seam. Without particles the header's fallback pose is used
/// if all three components are finite. Otherwise there is no pose.
pub fn estimate(frame: &TelemetryFrame) -> Option<Pose2> {
    mean_pose(&frame.particles).or_else(|| {
        let fallback = frame.header.fallback_pose;
        fallback.is_finite().then_some(fallback)
    })
}

/// Mean of a particle set, or `None` if it is empty.
pub fn mean_pose(particles: &[Pose2]) -> Option<Pose2> {
    if particles.is_empty() {
        return None;
    }
    let n = particles.len() as f64;
    let (mut x, mut y, mut s, mut c) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for p in particles {
        x += f64::from(p.x);
        y += f64::from(p.y);
        let (sin, cos) = f64::from(p.theta).sin_cos();
        s += sin;
        c += cos;
    }
    Some(Pose2 {
        x: (x / n) as f32,
        y: (y / n) as f32,
        theta: (s / n).atan2(c / n) as f32,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::frame::FrameHeader;

    fn frame_with(particles: Vec<Pose2>, fallback: Pose2) -> TelemetryFrame {
        TelemetryFrame {
            header: FrameHeader { fallback_pose: fallback, ..FrameHeader::default() },
            particles,
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents()
    }

    #[test]
    fn symmetric_headings_average_to_zero() {
        let pose = mean_pose(&[Pose2::new(0.0, 0.0, 0.1), Pose2::new(0.0, 0.0, -0.1)]).unwrap();
        assert_abs_diff_eq!(pose.theta, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn heading_mean_wraps_at_pi() {
        // Arithmetic mean would give ~0 here; the true mean direction is π.
        let pose = mean_pose(&[Pose2::new(0.0, 0.0, PI - 0.1), Pose2::new(0.0, 0.0, -PI + 0.1)])
            .unwrap();
        assert_abs_diff_eq!(pose.theta.abs(), PI, epsilon = 1e-5);
    }

    #[test]
    fn opposing_headings_do_not_panic() {
        let pose = mean_pose(&[Pose2::new(1.0, 2.0, 0.0), Pose2::new(3.0, 4.0, PI)]).unwrap();
        assert!(pose.theta.is_finite());
        assert_abs_diff_eq!(pose.x, 2.0);
        assert_abs_diff_eq!(pose.y, 3.0);
    }

    #[test]
    fn particles_take_precedence_over_fallback() {
        let frame = frame_with(vec![Pose2::new(1.0, 1.0, FRAC_PI_2)], Pose2::new(9.0, 9.0, 0.0));
        let pose = estimate(&frame).unwrap();
        assert_abs_diff_eq!(pose.x, 1.0);
        assert_abs_diff_eq!(pose.theta, FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn finite_fallback_used_without_particles() {
        let frame = frame_with(vec![], Pose2::new(4.0, -2.0, 0.5));
        assert_eq!(estimate(&frame), Some(Pose2::new(4.0, -2.0, 0.5)));
    }

    #[test]
    fn non_finite_fallback_means_no_pose() {
        for bad in [
            Pose2::new(f32::NAN, 0.0, 0.0),
            Pose2::new(0.0, f32::INFINITY, 0.0),
            Pose2::new(0.0, 0.0, f32::NEG_INFINITY),
        ] {
            assert_eq!(estimate(&frame_with(vec![], bad)), None);
        }
    }

    #[test]
    fn transform_rotates_then_translates() {
        let pose = Pose2::new(1.0, 0.0, FRAC_PI_2);
        let p = pose.transform_point(Point2::new(1.0, 0.0));
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-6);
    }
}
