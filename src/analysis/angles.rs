//! Elbow flexion (and, for strict counting, body alignment) from a single pose.

use serde::{Deserialize, Serialize};

use crate::pose::{BodySide, Keypoint, Pose};

/// Per-frame input to the rep counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleSample {
    /// Elbow angle in degrees, `[0, 180]`. Meaningless when `side` is `None`.
    pub elbow_deg: f32,
    /// Arm the angle was measured on; `None` when neither arm was visible.
    pub side: Option<BodySide>,
    /// Shoulder–hip–knee angle on the same side, when hip and knee are visible.
    pub body_deg: Option<f32>,
}

impl AngleSample {
    pub fn invalid() -> Self {
        Self {
            elbow_deg: 0.0,
            side: None,
            body_deg: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.side.is_some() && self.elbow_deg.is_finite()
    }
}

/// Unsigned angle at `vertex` between the rays towards `a` and `c`, folded
/// into `[0, 180]` degrees.
pub fn joint_angle(a: &Keypoint, vertex: &Keypoint, c: &Keypoint) -> f32 {
    let radians = (c.y - vertex.y).atan2(c.x - vertex.x) - (a.y - vertex.y).atan2(a.x - vertex.x);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

fn visible(keypoint: &Keypoint, min_confidence: f32) -> bool {
    keypoint.score > min_confidence
}

fn arm_visible(pose: &Pose, side: BodySide, min_confidence: f32) -> bool {
    [side.shoulder(), side.elbow(), side.wrist()]
        .into_iter()
        .all(|joint| visible(pose.get(joint), min_confidence))
}

/// Left arm first, right arm as fallback; invalid sample when neither has all
/// three joints above `min_confidence`.
pub fn extract_angles(pose: &Pose, min_confidence: f32) -> AngleSample {
    let side = [BodySide::Left, BodySide::Right]
        .into_iter()
        .find(|side| arm_visible(pose, *side, min_confidence));

    let Some(side) = side else {
        return AngleSample::invalid();
    };

    let shoulder = pose.get(side.shoulder());
    let elbow_deg = joint_angle(shoulder, pose.get(side.elbow()), pose.get(side.wrist()));

    let hip = pose.get(side.hip());
    let knee = pose.get(side.knee());
    let body_deg = (visible(hip, min_confidence) && visible(knee, min_confidence))
        .then(|| joint_angle(shoulder, hip, knee));

    AngleSample {
        elbow_deg,
        side: Some(side),
        body_deg,
    }
}
