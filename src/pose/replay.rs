//! Scripted pose detector and paced frame source.
//!
//! Used to replay recorded or synthetic movement through a real session
//! without a camera or model, and by the crate's own tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::RgbImage;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{BodySide, CameraFacing, Frame, FrameGate, FrameSource, Joint, Keypoint, Pose, PoseDetector};

const SEGMENT_LEN: f32 = 100.0;
const DEFAULT_SCORE: f32 = 0.9;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Builds poses with exact elbow and body angles.
#[derive(Debug, Clone, Default)]
pub struct SyntheticPose {
    arms: Vec<(BodySide, f32)>,
    torsos: Vec<(BodySide, f32)>,
    overrides: Vec<(Joint, f32)>,
}

impl SyntheticPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place shoulder, elbow and wrist of `side` so the elbow angle is `elbow_deg`.
    pub fn arm(mut self, side: BodySide, elbow_deg: f32) -> Self {
        self.arms.push((side, elbow_deg));
        self
    }

    /// Place hip and knee of `side` so shoulder–hip–knee is `body_deg`.
    pub fn torso(mut self, side: BodySide, body_deg: f32) -> Self {
        self.torsos.push((side, body_deg));
        self
    }

    pub fn confidence(mut self, joint: Joint, score: f32) -> Self {
        self.overrides.push((joint, score));
        self
    }

    pub fn build(self) -> Pose {
        let mut pose = Pose::default();

        for (side, elbow_deg) in &self.arms {
            let elbow = Keypoint::new(origin_x(*side), 200.0, DEFAULT_SCORE);
            let wrist = Keypoint::new(elbow.x + SEGMENT_LEN, elbow.y, DEFAULT_SCORE);
            let rad = elbow_deg.to_radians();
            let shoulder = Keypoint::new(
                elbow.x + SEGMENT_LEN * rad.cos(),
                elbow.y + SEGMENT_LEN * rad.sin(),
                DEFAULT_SCORE,
            );
            pose.set(side.elbow(), elbow);
            pose.set(side.wrist(), wrist);
            pose.set(side.shoulder(), shoulder);
        }

        for (side, body_deg) in &self.torsos {
            let mut shoulder = *pose.get(side.shoulder());
            if shoulder.score == 0.0 {
                shoulder = Keypoint::new(origin_x(*side), 100.0, DEFAULT_SCORE);
                pose.set(side.shoulder(), shoulder);
            }
            let hip = Keypoint::new(shoulder.x - SEGMENT_LEN, shoulder.y, DEFAULT_SCORE);
            let rad = body_deg.to_radians();
            let knee = Keypoint::new(
                hip.x + SEGMENT_LEN * rad.cos(),
                hip.y + SEGMENT_LEN * rad.sin(),
                DEFAULT_SCORE,
            );
            pose.set(side.hip(), hip);
            pose.set(side.knee(), knee);
        }

        for (joint, score) in self.overrides {
            let mut keypoint = *pose.get(joint);
            keypoint.score = score;
            pose.set(joint, keypoint);
        }

        pose
    }
}

fn origin_x(side: BodySide) -> f32 {
    match side {
        BodySide::Left => 400.0,
        BodySide::Right => 800.0,
    }
}

/// One scripted answer to an `estimate` call.
#[derive(Debug, Clone)]
pub enum ScriptedEstimate {
    Pose(Pose),
    Nobody,
    Failure(String),
}

/// Answers `estimate` calls from a script, in order. Once the script runs
/// out, every call reports nobody in frame.
pub struct ScriptedPoseDetector {
    script: Mutex<VecDeque<ScriptedEstimate>>,
    latency: Duration,
    warm_up_error: Option<String>,
    calls: AtomicU64,
}

impl ScriptedPoseDetector {
    pub fn new(script: impl IntoIterator<Item = ScriptedEstimate>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            latency: Duration::ZERO,
            warm_up_error: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Left-arm poses with the given elbow angles.
    pub fn from_elbow_angles(angles: &[f32]) -> Self {
        Self::new(angles.iter().map(|deg| {
            ScriptedEstimate::Pose(SyntheticPose::new().arm(BodySide::Left, *deg).build())
        }))
    }

    /// Simulated inference time per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_warm_up(mut self, reason: impl Into<String>) -> Self {
        self.warm_up_error = Some(reason.into());
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl PoseDetector for ScriptedPoseDetector {
    async fn warm_up(&self) -> Result<()> {
        match &self.warm_up_error {
            Some(reason) => Err(anyhow!("{reason}")),
            None => Ok(()),
        }
    }

    async fn estimate(&self, _frame: &Frame) -> Result<Option<Pose>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            time::sleep(self.latency).await;
        }

        let next = lock(&self.script).pop_front();
        match next {
            Some(ScriptedEstimate::Pose(pose)) => Ok(Some(pose)),
            Some(ScriptedEstimate::Nobody) | None => Ok(None),
            Some(ScriptedEstimate::Failure(reason)) => Err(anyhow!("{reason}")),
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    opened: Vec<CameraFacing>,
    closes: u32,
    is_open: bool,
}

/// Observes a [`ScriptedFrameSource`] after it has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct SourceMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl SourceMonitor {
    pub fn opened(&self) -> Vec<CameraFacing> {
        lock(&self.state).opened.clone()
    }

    pub fn closes(&self) -> u32 {
        lock(&self.state).closes
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).is_open
    }
}

/// A camera stand-in that captures blank frames at a fixed rate and hands
/// them over through a [`FrameGate`], so a slow detector sees real drops.
pub struct ScriptedFrameSource {
    frame_interval: Duration,
    frame_limit: Option<u64>,
    successful_opens_allowed: Option<usize>,
    gate: Option<FrameGate>,
    producer: Option<JoinHandle<()>>,
    monitor: SourceMonitor,
    dropped_before: u64,
}

impl ScriptedFrameSource {
    pub fn new(fps: u32) -> Self {
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            frame_limit: None,
            successful_opens_allowed: None,
            gate: None,
            producer: None,
            monitor: SourceMonitor::default(),
            dropped_before: 0,
        }
    }

    /// End the stream after `frames` captures per open.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Every `open` fails, as if the camera were held by another app.
    pub fn unavailable(self) -> Self {
        self.fail_after_opens(0)
    }

    /// Allow `opens` successful opens; later ones fail.
    pub fn fail_after_opens(mut self, opens: usize) -> Self {
        self.successful_opens_allowed = Some(opens);
        self
    }

    pub fn monitor(&self) -> SourceMonitor {
        self.monitor.clone()
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn open(&mut self, facing: CameraFacing) -> Result<()> {
        {
            let mut state = lock(&self.monitor.state);
            let attempts = state.opened.len();
            state.opened.push(facing);
            if let Some(allowed) = self.successful_opens_allowed {
                if attempts >= allowed {
                    return Err(anyhow!("camera {facing:?} unavailable"));
                }
            }
            state.is_open = true;
        }

        let gate = FrameGate::new();
        let producer_gate = gate.clone();
        let interval = self.frame_interval;
        let limit = self.frame_limit;

        let producer = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut captured: u64 = 0;
            loop {
                ticker.tick().await;
                if producer_gate.is_closed() {
                    break;
                }
                if limit.is_some_and(|limit| captured >= limit) {
                    producer_gate.close();
                    break;
                }
                producer_gate.offer(RgbImage::new(4, 4));
                captured += 1;
            }
        });

        self.gate = Some(gate);
        self.producer = Some(producer);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &self.gate {
            Some(gate) => Ok(gate.next().await),
            None => Err(anyhow!("frame source is not open")),
        }
    }

    fn close(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        if let Some(gate) = self.gate.take() {
            gate.close();
            self.dropped_before += gate.dropped();
        }

        let mut state = lock(&self.monitor.state);
        if state.is_open {
            state.is_open = false;
            state.closes += 1;
        }
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped_before + self.gate.as_ref().map_or(0, FrameGate::dropped)
    }
}
