use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    analysis::{extract_angles, AngleSample},
    metrics::{FrameMetricsCollector, MetricsSnapshot},
    pose::{CameraFacing, FrameSource, Pose, PoseDetector},
};

use super::{
    config::SessionConfig,
    error::{Result, SessionError},
    events::{FinishReason, SessionEvent, SessionOutcome, SessionPhase, SessionSnapshot},
    frame_loop::frame_loop,
    state::{ClockTick, SessionMachine},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 64;

/// Receives the terminal outcome of every session that reached the active
/// window and was not cancelled.
pub type CompletionCallback = Box<dyn FnOnce(SessionOutcome) + Send + 'static>;

/// Where poses come from.
pub enum PoseFeed {
    /// The session drives the camera and runs the detector itself.
    Camera {
        source: Box<dyn FrameSource>,
        detector: Arc<dyn PoseDetector>,
    },
    /// The caller runs inference and pushes poses with [`SessionHandle::submit_pose`].
    External,
}

pub(crate) struct SessionShared {
    pub(crate) machine: Mutex<SessionMachine>,
    pub(crate) config: SessionConfig,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) metrics: FrameMetricsCollector,
    events: broadcast::Sender<SessionEvent>,
    outcome: watch::Sender<Option<SessionOutcome>>,
    facing: watch::Sender<CameraFacing>,
    on_complete: StdMutex<Option<CompletionCallback>>,
}

impl SessionShared {
    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) async fn apply_pose(&self, pose: &Pose) -> SessionSnapshot {
        let sample = extract_angles(pose, self.config.min_keypoint_confidence);
        self.apply_sample(&sample).await
    }

    pub(crate) async fn apply_sample(&self, sample: &AngleSample) -> SessionSnapshot {
        let (before, update, after) = {
            let mut machine = self.machine.lock().await;
            let before = machine.snapshot();
            let update = machine.on_sample(sample);
            (before, update, machine.snapshot())
        };

        if let Some(update) = update.filter(|update| update.completed_rep) {
            log::debug!("session {} rep {} counted", after.session_id, update.count);
        }
        if before != after {
            self.emit(SessionEvent::StateChanged(after.clone()));
        }
        after
    }

    /// Finish for `reason` unless something else already finished the session.
    pub(crate) async fn finish(&self, reason: FinishReason) -> Option<SessionOutcome> {
        let outcome = self.machine.lock().await.finish(reason);
        if let Some(outcome) = &outcome {
            self.conclude(outcome.clone());
        }
        outcome
    }

    /// Side effects of the single transition into `Finished`.
    fn conclude(&self, outcome: SessionOutcome) {
        self.cancel_token.cancel();

        log_info!(
            "session {} finished ({}) with {} reps after {}s",
            outcome.session_id,
            outcome.reason.as_str(),
            outcome.rep_count,
            outcome.active_elapsed_secs
        );

        self.emit(SessionEvent::Finished(outcome.clone()));
        self.outcome.send_replace(Some(outcome.clone()));

        // Taken either way so whoever waits on the callback is released.
        let callback = match self.on_complete.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match callback {
            Some(callback) if outcome.reports_result() => callback(outcome),
            Some(_) if outcome.reason != FinishReason::Cancelled => log_warn!(
                "session {} lost its camera before counting started; not reported",
                outcome.session_id
            ),
            _ => {}
        }
    }
}

/// Start a timed attempt.
///
/// The config is validated, the detector warmed up and the camera opened
/// before anything is spawned; if any of these fails the session never
/// exists and `on_complete` is dropped without being called.
pub async fn start_session(
    config: SessionConfig,
    feed: PoseFeed,
    on_complete: CompletionCallback,
) -> Result<SessionHandle> {
    config.validate()?;

    let camera = match feed {
        PoseFeed::Camera {
            mut source,
            detector,
        } => {
            detector.warm_up().await.map_err(|err| {
                log_error!("pose detector failed to initialize: {err:?}");
                SessionError::DetectorUnavailable(format!("{err:#}"))
            })?;
            source.open(config.facing).await.map_err(|err| {
                log_error!("camera {:?} failed to open: {err:?}", config.facing);
                SessionError::CameraUnavailable(format!("{err:#}"))
            })?;
            Some((source, detector))
        }
        PoseFeed::External => None,
    };

    let session_id = Uuid::new_v4().to_string();
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let (outcome, _) = watch::channel(None);
    let (facing, facing_rx) = watch::channel(config.facing);

    let shared = Arc::new(SessionShared {
        machine: Mutex::new(SessionMachine::new(session_id.clone(), config.clone())),
        config: config.clone(),
        cancel_token: CancellationToken::new(),
        metrics: FrameMetricsCollector::new(),
        events,
        outcome,
        facing,
        on_complete: StdMutex::new(Some(on_complete)),
    });

    let has_camera = camera.is_some();
    let mut tasks = vec![spawn_ticker(shared.clone())];
    if let Some((source, detector)) = camera {
        tasks.push(tokio::spawn(frame_loop(
            shared.clone(),
            source,
            detector,
            facing_rx,
        )));
    }

    log_info!(
        "session {} started: {}s countdown, {}s window, {:?} mode, camera={}",
        session_id,
        config.countdown_secs,
        config.active_secs,
        config.mode,
        has_camera
    );

    let snapshot = shared.machine.lock().await.snapshot();
    shared.emit(SessionEvent::StateChanged(snapshot));

    Ok(SessionHandle {
        shared,
        tasks: Arc::new(Mutex::new(tasks)),
        has_camera,
    })
}

fn spawn_ticker(shared: Arc<SessionShared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // First tick one full period after start, not immediately.
        let mut interval = time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = shared.cancel_token.cancelled() => break,
                _ = interval.tick() => {}
            }

            let (tick, snapshot) = {
                let mut machine = shared.machine.lock().await;
                let tick = machine.tick_clock();
                (tick, machine.snapshot())
            };

            match tick {
                ClockTick::Countdown { .. } | ClockTick::Active { .. } => {
                    shared.emit(SessionEvent::StateChanged(snapshot));
                }
                ClockTick::Started { active_secs } => {
                    log_info!(
                        "session {} countdown over; counting for {}s",
                        snapshot.session_id,
                        active_secs
                    );
                    shared.emit(SessionEvent::StateChanged(snapshot));
                }
                ClockTick::Expired(outcome) => {
                    shared.conclude(outcome);
                    break;
                }
                ClockTick::Finished => break,
            }
        }
    })
}

/// Caller-side control of one running session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    has_camera: bool,
}

impl SessionHandle {
    pub async fn session_id(&self) -> String {
        self.shared.machine.lock().await.session_id().to_string()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.machine.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.get_snapshot().await
    }

    /// Terminal outcome, if the session already finished.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.shared.outcome.borrow().clone()
    }

    /// Push one externally estimated pose. Poses are applied in call order;
    /// after the session finished they are ignored.
    pub async fn submit_pose(&self, pose: &Pose) -> SessionSnapshot {
        self.shared.apply_pose(pose).await
    }

    /// Finish early and report the reps counted so far through the same path
    /// as a timeout. Ignored during the countdown (returns `None`); once
    /// finished it returns the existing outcome.
    pub async fn stop(&self) -> Option<SessionOutcome> {
        let (stopped, existing) = {
            let mut machine = self.shared.machine.lock().await;
            let stopped = machine.stop();
            (stopped, machine.outcome().cloned())
        };

        match stopped {
            Some(outcome) => {
                self.shared.conclude(outcome.clone());
                self.join_tasks().await;
                Some(outcome)
            }
            None => {
                if existing.is_none() {
                    log_warn!("stop requested during countdown; ignoring");
                }
                existing
            }
        }
    }

    /// Abort without reporting. Returns once the camera has been released and
    /// both the ticker and the frame loop are gone.
    pub async fn cancel(&self) {
        self.shared.finish(FinishReason::Cancelled).await;
        self.shared.cancel_token.cancel();
        self.join_tasks().await;
    }

    /// Switch between front and back camera. The half-finished rep, if any,
    /// is discarded; the count is kept. Asking for the camera already in use
    /// changes nothing.
    pub async fn switch_camera(&self, facing: CameraFacing) {
        if self.has_camera {
            if self.shared.machine.lock().await.phase() == SessionPhase::Finished {
                return;
            }
            // The frame loop reopens the stream and resets the rep phase.
            self.shared.facing.send_if_modified(|requested| {
                if *requested == facing {
                    return false;
                }
                *requested = facing;
                true
            });
            return;
        }

        let snapshot = {
            let mut machine = self.shared.machine.lock().await;
            if machine.phase() == SessionPhase::Finished || machine.facing() == facing {
                return;
            }
            machine.switch_facing(facing);
            machine.snapshot()
        };
        log_info!("session {} switched to {:?} camera", snapshot.session_id, facing);
        self.shared.emit(SessionEvent::StateChanged(snapshot));
    }

    /// Wait for the terminal outcome.
    pub async fn finished(&self) -> SessionOutcome {
        let mut outcome_rx = self.shared.outcome.subscribe();
        loop {
            if let Some(outcome) = outcome_rx.borrow_and_update().clone() {
                return outcome;
            }
            if outcome_rx.changed().await.is_err() {
                // Sender gone: nothing can finish the session any more.
                std::future::pending::<()>().await;
            }
        }
    }

    async fn join_tasks(&self) {
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log_error!("session task failed to join: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{Feedback, RepPhase},
        pose::{
            replay::{ScriptedEstimate, ScriptedFrameSource, ScriptedPoseDetector, SyntheticPose},
            BodySide,
        },
        utils::init_logging,
    };

    fn config(countdown_secs: u32, active_secs: u32) -> SessionConfig {
        SessionConfig {
            countdown_secs,
            active_secs,
            ..SessionConfig::default()
        }
    }

    fn arm(deg: f32) -> Pose {
        SyntheticPose::new().arm(BodySide::Left, deg).build()
    }

    fn recorder() -> (Arc<StdMutex<Vec<SessionOutcome>>>, CompletionCallback) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (
            seen,
            Box::new(move |outcome| sink.lock().unwrap().push(outcome)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_when_countdown_and_window_elapse() {
        init_logging();
        let (seen, on_complete) = recorder();
        let started = Instant::now();

        let handle = start_session(config(5, 60), PoseFeed::External, on_complete)
            .await
            .unwrap();
        let outcome = handle.finished().await;

        assert_eq!(started.elapsed(), Duration::from_secs(65));
        assert_eq!(outcome.reason, FinishReason::TimeUp);
        assert_eq!(outcome.active_elapsed_secs, 60);
        assert_eq!(seen.lock().unwrap().as_slice(), &[outcome]);
        assert_eq!(handle.snapshot().await.phase, SessionPhase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn early_stop_flushes_count_and_ignores_late_frames() {
        let (seen, on_complete) = recorder();
        let handle = start_session(config(5, 60), PoseFeed::External, on_complete)
            .await
            .unwrap();

        time::sleep(Duration::from_millis(15_500)).await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.active_remaining_secs, 50);

        for deg in [170.0, 80.0, 170.0, 80.0, 170.0] {
            handle.submit_pose(&arm(deg)).await;
        }
        let outcome = handle.stop().await.expect("stop during active window");
        assert_eq!(outcome.rep_count, 2);
        assert_eq!(outcome.reason, FinishReason::Stopped);
        assert_eq!(outcome.active_elapsed_secs, 10);

        for deg in [80.0, 170.0] {
            handle.submit_pose(&arm(deg)).await;
        }
        time::sleep(Duration::from_secs(120)).await;

        assert_eq!(handle.snapshot().await.rep_count, 2);
        assert_eq!(handle.stop().await, Some(outcome.clone()));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_countdown_is_ignored() {
        let (_seen, on_complete) = recorder();
        let handle = start_session(config(5, 60), PoseFeed::External, on_complete)
            .await
            .unwrap();

        assert!(handle.stop().await.is_none());
        assert_eq!(handle.snapshot().await.phase, SessionPhase::Countdown);
        handle.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_never_reports() {
        let (seen, on_complete) = recorder();
        let handle = start_session(config(5, 60), PoseFeed::External, on_complete)
            .await
            .unwrap();
        time::sleep(Duration::from_millis(7_500)).await;
        handle.submit_pose(&arm(80.0)).await;

        handle.cancel().await;

        let outcome = handle.finished().await;
        assert_eq!(outcome.reason, FinishReason::Cancelled);
        assert!(seen.lock().unwrap().is_empty());

        handle.submit_pose(&arm(170.0)).await;
        assert_eq!(handle.snapshot().await.rep_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_ticks_and_the_finish() {
        let (_seen, on_complete) = recorder();
        let handle = start_session(config(2, 3), PoseFeed::External, on_complete)
            .await
            .unwrap();
        let mut events = handle.subscribe();

        let mut remaining = Vec::new();
        let finished = loop {
            match events.recv().await.unwrap() {
                SessionEvent::StateChanged(snapshot) => remaining.push((
                    snapshot.phase,
                    snapshot.countdown_remaining_secs,
                    snapshot.active_remaining_secs,
                )),
                SessionEvent::Finished(outcome) => break outcome,
            }
        };

        assert_eq!(
            remaining,
            vec![
                (SessionPhase::Countdown, 1, 3),
                (SessionPhase::Active, 0, 3),
                (SessionPhase::Active, 0, 2),
                (SessionPhase::Active, 0, 1),
            ]
        );
        assert_eq!(finished.reason, FinishReason::TimeUp);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_feed_counts_reps_until_stream_ends() {
        let (seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).with_frame_limit(5);
        let camera = source.monitor();
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[
            170.0, 80.0, 170.0, 80.0, 170.0,
        ]));

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector: detector.clone(),
            },
            on_complete,
        )
        .await
        .unwrap();

        let outcome = handle.finished().await;
        handle.cancel().await;

        assert_eq!(outcome.rep_count, 2);
        assert_eq!(outcome.reason, FinishReason::SourceLost);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(detector.calls(), 5);
        assert_eq!(camera.opened(), vec![CameraFacing::Front]);
        assert!(!camera.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn inference_failures_are_skipped() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).with_frame_limit(6);
        let detector = Arc::new(ScriptedPoseDetector::new([
            ScriptedEstimate::Pose(arm(170.0)),
            ScriptedEstimate::Failure("delegate crashed".into()),
            ScriptedEstimate::Nobody,
            ScriptedEstimate::Pose(arm(80.0)),
            ScriptedEstimate::Failure("delegate crashed".into()),
            ScriptedEstimate::Pose(arm(170.0)),
        ]));

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        let outcome = handle.finished().await;
        let metrics = handle.metrics().await;

        assert_eq!(outcome.rep_count, 1);
        assert_eq!(metrics.frame_count, 6);
        assert_eq!(metrics.failed_count, 2);
        assert_eq!(metrics.no_pose_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_inference_drops_frames_instead_of_queueing() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).with_frame_limit(30);
        let detector = Arc::new(
            ScriptedPoseDetector::from_elbow_angles(&[170.0; 30])
                .with_latency(Duration::from_millis(100)),
        );

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector: detector.clone(),
            },
            on_complete,
        )
        .await
        .unwrap();

        handle.finished().await;
        handle.cancel().await;
        let metrics = handle.metrics().await;

        assert!(metrics.dropped_count > 0);
        assert!(metrics.frame_count < 30);
        assert!(metrics.frame_count + metrics.dropped_count <= 30);
        assert_eq!(detector.calls(), metrics.frame_count);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_frames_only_update_the_cue() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(10);
        let detector = Arc::new(ScriptedPoseDetector::new([
            ScriptedEstimate::Pose(arm(80.0)),
            ScriptedEstimate::Pose(arm(170.0)),
            ScriptedEstimate::Pose(Pose::default()),
        ]));

        let handle = start_session(
            config(5, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        time::sleep(Duration::from_millis(250)).await;
        let snapshot = handle.snapshot().await;
        handle.cancel().await;

        assert_eq!(snapshot.phase, SessionPhase::Countdown);
        assert_eq!(snapshot.rep_count, 0);
        assert_eq!(snapshot.rep_phase, RepPhase::AwaitingDown);
        assert_eq!(snapshot.feedback, Feedback::BodyNotVisible);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_camera_reopens_stream_and_resets_phase() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30);
        let camera = source.monitor();
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[170.0, 80.0]));

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.snapshot().await.rep_phase, RepPhase::AwaitingUp);

        handle.switch_camera(CameraFacing::Back).await;
        time::sleep(Duration::from_millis(200)).await;

        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.facing, CameraFacing::Back);
        assert_eq!(snapshot.rep_phase, RepPhase::AwaitingDown);
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(camera.opened(), vec![CameraFacing::Front, CameraFacing::Back]);

        handle.cancel().await;
        assert!(!camera.is_open());
        assert_eq!(camera.closes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn losing_the_camera_on_switch_still_reports() {
        let (seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).fail_after_opens(1);
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[170.0, 80.0, 170.0]));

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        time::sleep(Duration::from_millis(200)).await;
        handle.switch_camera(CameraFacing::Back).await;
        let outcome = handle.finished().await;

        assert_eq!(outcome.reason, FinishReason::SourceLost);
        assert_eq!(outcome.rep_count, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn losing_the_camera_during_countdown_is_not_reported() {
        let (seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).fail_after_opens(1);
        let camera = source.monitor();
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[170.0, 80.0]));

        let handle = start_session(
            config(5, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        time::sleep(Duration::from_millis(500)).await;
        handle.switch_camera(CameraFacing::Back).await;
        let outcome = handle.finished().await;

        assert_eq!(outcome.reason, FinishReason::SourceLost);
        assert_eq!(outcome.active_elapsed_secs, 0);
        assert!(!outcome.reached_active);
        assert!(seen.lock().unwrap().is_empty());

        handle.cancel().await;
        assert!(!camera.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ending_during_countdown_is_not_reported() {
        let (seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).with_frame_limit(3);
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[170.0, 80.0, 170.0]));

        let handle = start_session(
            config(5, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        let outcome = handle.finished().await;

        assert_eq!(outcome.reason, FinishReason::SourceLost);
        assert_eq!(outcome.rep_count, 0);
        assert!(!outcome.reports_result());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_to_the_current_camera_keeps_the_half_rep() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30);
        let camera = source.monitor();
        let detector = Arc::new(ScriptedPoseDetector::from_elbow_angles(&[170.0, 80.0]));

        let handle = start_session(
            config(0, 60),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await
        .unwrap();

        time::sleep(Duration::from_millis(200)).await;
        handle.switch_camera(CameraFacing::Front).await;
        time::sleep(Duration::from_millis(200)).await;

        assert_eq!(handle.snapshot().await.rep_phase, RepPhase::AwaitingUp);
        assert_eq!(camera.opened(), vec![CameraFacing::Front]);
        assert_eq!(camera.closes(), 0);

        handle.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn external_feed_ignores_a_switch_to_the_same_camera() {
        let (_seen, on_complete) = recorder();
        let handle = start_session(config(0, 60), PoseFeed::External, on_complete)
            .await
            .unwrap();

        handle.submit_pose(&arm(170.0)).await;
        handle.submit_pose(&arm(80.0)).await;
        handle.switch_camera(CameraFacing::Front).await;
        assert_eq!(handle.snapshot().await.rep_phase, RepPhase::AwaitingUp);

        handle.submit_pose(&arm(170.0)).await;
        assert_eq!(handle.snapshot().await.rep_count, 1);
        handle.cancel().await;
    }

    #[tokio::test]
    async fn unavailable_camera_never_starts() {
        let (seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30).unavailable();
        let detector = Arc::new(ScriptedPoseDetector::new([]));

        let result = start_session(
            SessionConfig::default(),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await;

        assert!(matches!(result, Err(SessionError::CameraUnavailable(_))));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn detector_failure_never_opens_camera() {
        let (_seen, on_complete) = recorder();
        let source = ScriptedFrameSource::new(30);
        let camera = source.monitor();
        let detector = Arc::new(ScriptedPoseDetector::new([]).failing_warm_up("no GPU backend"));

        let result = start_session(
            SessionConfig::default(),
            PoseFeed::Camera {
                source: Box::new(source),
                detector,
            },
            on_complete,
        )
        .await;

        match result {
            Err(SessionError::DetectorUnavailable(reason)) => assert!(reason.contains("no GPU")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("session must not start"),
        }
        assert!(camera.opened().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_refused() {
        let (_seen, on_complete) = recorder();
        let result = start_session(config(5, 0), PoseFeed::External, on_complete).await;
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }
}
