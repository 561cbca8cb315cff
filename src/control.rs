//! Outbound control messages (viewer → robot).
//!
//! Sent as JSON text over the same connection that carries telemetry:
//! `{"type":"set_initial_pose","x":1.0,"y":2.0,"theta":0.5}`.

use serde::{Deserialize, Serialize};

use crate::pose::Pose2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Re-seed the localizer at a pose.
    SetInitialPose { x: f32, y: f32, theta: f32 },
    /// Ask the navigator to drive to a pose.
    SetNavGoal { x: f32, y: f32, theta: f32 },
}

impl ControlMessage {
    pub fn set_initial_pose(pose: Pose2) -> Self {
        Self::SetInitialPose { x: pose.x, y: pose.y, theta: pose.theta }
    }

    pub fn set_nav_goal(pose: Pose2) -> Self {
        Self::SetNavGoal { x: pose.x, y: pose.y, theta: pose.theta }
    }

    pub fn pose(&self) -> Pose2 {
        match *self {
            Self::SetInitialPose { x, y, theta } | Self::SetNavGoal { x, y, theta } => {
                Pose2::new(x, y, theta)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_pose_wire_shape() {
        let msg = ControlMessage::set_initial_pose(Pose2::new(1.5, -2.0, 0.25));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "set_initial_pose", "x": 1.5, "y": -2.0, "theta": 0.25})
        );
    }

    #[test]
    fn nav_goal_parses_back() {
        let json = r#"{"type":"set_nav_goal","x":3.0,"y":4.0,"theta":-1.0}"#;
        let msg: ControlMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ControlMessage::set_nav_goal(Pose2::new(3.0, 4.0, -1.0)));
        assert_eq!(msg.pose(), Pose2::new(3.0, 4.0, -1.0));
    }
}
