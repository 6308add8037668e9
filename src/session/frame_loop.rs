use chrono::Utc;
use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{Duration, Instant},
};

use crate::{
    metrics::{FrameMetrics, FrameOutcome},
    pose::{CameraFacing, Frame, FrameSource, PoseDetector},
};

use super::{
    controller::SessionShared,
    events::{FinishReason, SessionEvent, SessionPhase},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const INFERENCE_TIMEOUT_SECS: u64 = 2;
const CAPTURE_RETRY_MS: u64 = 50;

/// Pull frames, estimate poses and feed them to the session until the
/// session finishes or the stream ends. Owns the camera and always releases
/// it on the way out.
pub(crate) async fn frame_loop(
    shared: Arc<SessionShared>,
    mut source: Box<dyn FrameSource>,
    detector: Arc<dyn PoseDetector>,
    mut facing_rx: watch::Receiver<CameraFacing>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shared.cancel_token.cancelled() => {
                log_info!("frame loop shutting down");
                break;
            }
            changed = facing_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let facing = *facing_rx.borrow_and_update();
                if !reacquire(&shared, source.as_mut(), facing).await {
                    break;
                }
            }
            next = source.next_frame() => {
                match next {
                    Ok(Some(frame)) => {
                        process_frame(&shared, detector.as_ref(), &frame).await;
                        shared.metrics.set_dropped(source.dropped_frames()).await;
                    }
                    Ok(None) => {
                        log_warn!("camera stream ended");
                        shared.finish(FinishReason::SourceLost).await;
                        break;
                    }
                    Err(err) => {
                        log_warn!("frame capture failed: {err:?}");
                        tokio::time::sleep(Duration::from_millis(CAPTURE_RETRY_MS)).await;
                    }
                }
            }
        }
    }

    source.close();
}

/// Reopen the stream facing the other way. Returns `false` when the loop
/// should stop.
async fn reacquire(
    shared: &SessionShared,
    source: &mut dyn FrameSource,
    facing: CameraFacing,
) -> bool {
    if shared.machine.lock().await.phase() == SessionPhase::Finished {
        return false;
    }

    log_info!("switching to {facing:?} camera");
    source.close();

    if let Err(err) = source.open(facing).await {
        log_error!("failed to reopen camera facing {facing:?}: {err:?}");
        shared.finish(FinishReason::SourceLost).await;
        return false;
    }

    let snapshot = {
        let mut machine = shared.machine.lock().await;
        machine.switch_facing(facing);
        machine.snapshot()
    };
    shared.emit(SessionEvent::StateChanged(snapshot));
    true
}

async fn process_frame(shared: &SessionShared, detector: &dyn PoseDetector, frame: &Frame) {
    let started = Instant::now();
    let result = tokio::select! {
        biased;
        _ = shared.cancel_token.cancelled() => {
            log_info!("abandoning inference on frame {}: session closed", frame.seq);
            return;
        }
        result = tokio::time::timeout(
            Duration::from_secs(INFERENCE_TIMEOUT_SECS),
            detector.estimate(frame),
        ) => result,
    };
    let inference_ms = started.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(Ok(Some(pose))) => {
            shared.apply_pose(&pose).await;
            FrameOutcome::Pose
        }
        Ok(Ok(None)) => FrameOutcome::NoPose,
        Ok(Err(err)) => {
            log_warn!("pose estimation failed on frame {}: {err:?}", frame.seq);
            FrameOutcome::Failed
        }
        Err(_) => {
            log_warn!(
                "pose estimation timeout (> {}s) on frame {}",
                INFERENCE_TIMEOUT_SECS,
                frame.seq
            );
            FrameOutcome::Failed
        }
    };

    shared
        .metrics
        .record_frame(FrameMetrics {
            timestamp: Utc::now(),
            seq: frame.seq,
            inference_ms,
            outcome,
        })
        .await;
}
