//! Capabilities a session is constructed with.
//!
//! The detector and the camera are owned by the host application: it loads
//! the model once, hands an `Arc<dyn PoseDetector>` to every session and
//! tears it down when the app exits. A session only borrows them.

use anyhow::Result;
use async_trait::async_trait;

use super::{CameraFacing, Frame, Pose};

#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// Prepare the inference backend. Called once before the countdown starts;
    /// an error here means the session never starts.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Estimate the single tracked body in `frame`. `Ok(None)` means nobody
    /// was detected.
    async fn estimate(&self, frame: &Frame) -> Result<Option<Pose>>;
}

#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the camera stream for `facing`.
    async fn open(&mut self, facing: CameraFacing) -> Result<()>;

    /// Wait for the next frame. Implementations must hand out only frames
    /// captured after this call began; anything captured while the caller was
    /// busy is dropped, not buffered. `Ok(None)` means the stream ended.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the stream. Must be safe to call more than once.
    fn close(&mut self);

    /// Frames discarded because inference was still running.
    fn dropped_frames(&self) -> u64 {
        0
    }
}
