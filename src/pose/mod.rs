pub mod frame_gate;
pub mod replay;
pub mod source;

pub use frame_gate::FrameGate;
pub use source::{FrameSource, PoseDetector};

use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// The 17 landmarks emitted by single-person MoveNet-style detectors, in model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const COUNT: usize = 17;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Nose,
        Joint::LeftEye,
        Joint::RightEye,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Joint::Nose => "nose",
            Joint::LeftEye => "left_eye",
            Joint::RightEye => "right_eye",
            Joint::LeftEar => "left_ear",
            Joint::RightEar => "right_ear",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }

    pub fn from_name(name: &str) -> Option<Joint> {
        Joint::ALL.into_iter().find(|joint| joint.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodySide {
    Left,
    Right,
}

impl BodySide {
    pub fn shoulder(self) -> Joint {
        match self {
            BodySide::Left => Joint::LeftShoulder,
            BodySide::Right => Joint::RightShoulder,
        }
    }

    pub fn elbow(self) -> Joint {
        match self {
            BodySide::Left => Joint::LeftElbow,
            BodySide::Right => Joint::RightElbow,
        }
    }

    pub fn wrist(self) -> Joint {
        match self {
            BodySide::Left => Joint::LeftWrist,
            BodySide::Right => Joint::RightWrist,
        }
    }

    pub fn hip(self) -> Joint {
        match self {
            BodySide::Left => Joint::LeftHip,
            BodySide::Right => Joint::RightHip,
        }
    }

    pub fn knee(self) -> Joint {
        match self {
            BodySide::Left => Joint::LeftKnee,
            BodySide::Right => Joint::RightKnee,
        }
    }
}

/// Image-space landmark position with the detector's confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }
}

/// All keypoints of the single tracked body in one frame.
///
/// Joints the detector did not report keep a zero-confidence keypoint, so
/// they fail every visibility check instead of going missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    keypoints: [Keypoint; Joint::COUNT],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); Joint::COUNT],
        }
    }
}

impl Pose {
    pub fn new(keypoints: [Keypoint; Joint::COUNT]) -> Self {
        Self { keypoints }
    }

    /// Builds a pose from detector output keyed by MoveNet joint names.
    pub fn from_named<'a, I>(named: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Keypoint)>,
    {
        let mut pose = Self::default();
        for (name, keypoint) in named {
            match Joint::from_name(name) {
                Some(joint) => pose.set(joint, keypoint),
                None => log::debug!("ignoring unknown keypoint '{name}'"),
            }
        }
        pose
    }

    pub fn get(&self, joint: Joint) -> &Keypoint {
        &self.keypoints[joint.index()]
    }

    pub fn set(&mut self, joint: Joint, keypoint: Keypoint) {
        self.keypoints[joint.index()] = keypoint;
    }

    pub fn with(mut self, joint: Joint, keypoint: Keypoint) -> Self {
        self.set(joint, keypoint);
        self
    }

    pub fn keypoints(&self) -> &[Keypoint; Joint::COUNT] {
        &self.keypoints
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraFacing {
    /// Selfie camera; the feed is mirrored.
    #[default]
    Front,
    Back,
}

/// One captured video frame. Pixel data is shared, never copied, between the
/// camera driver and the inference call.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: Instant,
    pub image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self {
            seq,
            captured_at: Instant::now(),
            image: Arc::new(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_names_round_trip_through_lookup() {
        for joint in Joint::ALL {
            assert_eq!(Joint::from_name(joint.as_str()), Some(joint));
        }
        assert_eq!(Joint::from_name("left_toe"), None);
    }

    #[test]
    fn joint_index_follows_model_order() {
        assert_eq!(Joint::LeftShoulder.index(), 5);
        assert_eq!(Joint::RightWrist.index(), 10);
        assert_eq!(Joint::RightAnkle.index(), Joint::COUNT - 1);
    }

    #[test]
    fn from_named_leaves_missing_joints_invisible() {
        let pose = Pose::from_named([
            ("left_elbow", Keypoint::new(10.0, 20.0, 0.9)),
            ("tail", Keypoint::new(1.0, 1.0, 1.0)),
        ]);

        assert_eq!(pose.get(Joint::LeftElbow), &Keypoint::new(10.0, 20.0, 0.9));
        assert_eq!(pose.get(Joint::LeftWrist).score, 0.0);
    }
}
