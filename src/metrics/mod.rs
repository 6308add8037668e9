mod types;

pub use types::{FrameMetrics, FrameOutcome, MetricsSnapshot, SystemMetrics};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_FRAMES: usize = 20;

pub struct FrameMetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_frames: Vec<FrameMetrics>,
    frame_count: u64,
    failed_count: u64,
    no_pose_count: u64,
    dropped_count: u64,
    total_inference_ms: u64,
    system: System,
    pid: Pid,
}

impl FrameMetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Baseline refresh so the first CPU reading has a delta to work from.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_frames: Vec::with_capacity(MAX_RECENT_FRAMES),
                frame_count: 0,
                failed_count: 0,
                no_pose_count: 0,
                dropped_count: 0,
                total_inference_ms: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_frame(&self, metrics: FrameMetrics) {
        let mut state = self.inner.lock().await;

        state.frame_count += 1;
        state.total_inference_ms += metrics.inference_ms;
        match metrics.outcome {
            FrameOutcome::Pose => {}
            FrameOutcome::NoPose => state.no_pose_count += 1,
            FrameOutcome::Failed => state.failed_count += 1,
        }

        state.recent_frames.push(metrics);

        if state.recent_frames.len() > MAX_RECENT_FRAMES {
            state.recent_frames.remove(0);
        }
    }

    /// The frame source reports a running total; keep the latest.
    pub async fn set_dropped(&self, dropped: u64) {
        self.inner.lock().await.dropped_count = dropped;
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system_metrics = if let Some(process) = state.system.process(pid) {
            SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            }
        } else {
            SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            }
        };

        let mean_inference_ms = if state.frame_count == 0 {
            0.0
        } else {
            state.total_inference_ms as f64 / state.frame_count as f64
        };

        MetricsSnapshot {
            system: system_metrics,
            recent_frames: state.recent_frames.clone(),
            frame_count: state.frame_count,
            failed_count: state.failed_count,
            no_pose_count: state.no_pose_count,
            dropped_count: state.dropped_count,
            mean_inference_ms,
        }
    }
}

impl Default for FrameMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FrameMetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
