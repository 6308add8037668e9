//! Single-slot hand-off between a camera driver and the inference loop.
//!
//! The driver pushes every captured image with [`FrameGate::offer`]. The loop
//! pulls with [`FrameGate::next`]. From the moment the loop takes a frame
//! until it asks for the next one it counts as busy, and every frame offered
//! in that window is dropped. The loop therefore never works through a
//! backlog: latency stays bounded by one inference call.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use image::RgbImage;
use tokio::sync::Notify;

use super::Frame;

#[derive(Default)]
struct GateState {
    pending: Option<Frame>,
    busy: bool,
    closed: bool,
    next_seq: u64,
}

#[derive(Default)]
struct GateInner {
    state: Mutex<GateState>,
    notify: Notify,
    offered: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Clone, Default)]
pub struct FrameGate {
    inner: Arc<GateInner>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Hand a freshly captured image to the loop. Returns `false` when the
    /// image was dropped (loop busy, a frame already waiting, or gate closed).
    pub fn offer(&self, image: RgbImage) -> bool {
        self.inner.offered.fetch_add(1, Ordering::Relaxed);

        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if state.busy || state.pending.is_some() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending = Some(Frame::new(seq, image));
        drop(state);

        self.inner.notify.notify_one();
        true
    }

    /// Wait for the next frame captured after this call. `None` once closed
    /// and drained.
    pub async fn next(&self) -> Option<Frame> {
        {
            let mut state = self.lock();
            state.busy = false;
        }

        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.lock();
                if let Some(frame) = state.pending.take() {
                    state.busy = true;
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting frames. A frame already waiting is still handed out;
    /// after that `next` returns `None`.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
        }
        self.inner.notify.notify_waiters();
        self.inner.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn offered(&self) -> u64 {
        self.inner.offered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}
