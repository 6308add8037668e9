use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    Pose,
    NoPose,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
    pub inference_ms: u64,
    pub outcome: FrameOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_frames: Vec<FrameMetrics>,
    pub frame_count: u64,
    pub failed_count: u64,
    pub no_pose_count: u64,
    pub dropped_count: u64,
    pub mean_inference_ms: f64,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            system: SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            },
            recent_frames: Vec::new(),
            frame_count: 0,
            failed_count: 0,
            no_pose_count: 0,
            dropped_count: 0,
            mean_inference_ms: 0.0,
        }
    }
}
