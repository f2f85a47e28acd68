//! Latest-frame mailbox between the capture thread and the analysis worker
//!
//! Holds at most one frame. A new frame replaces whatever is still pending, so
//! the worker always picks up the newest frame once it becomes free.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

use crate::capture::CapturedFrame;

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<CapturedFrame>,
    closed: bool,
}

/// Single-entry, drop-older frame mailbox
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    notify: Notify,
    offered: AtomicU64,
    dropped: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the pending frame.
    ///
    /// Returns true when an unanalyzed frame was discarded to make room.
    /// Frames offered after [`close`](Self::close) are ignored.
    pub fn offer(&self, frame: CapturedFrame) -> bool {
        let replaced = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.pending.replace(frame).is_some()
        };

        self.offered.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        replaced
    }

    /// Wait for the next frame. Returns `None` once the slot is closed and
    /// nothing is pending.
    pub async fn next(&self) -> Option<CapturedFrame> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if let Some(frame) = state.pending.take() {
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting frames; a pending frame can still be taken
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    /// True while a frame is waiting to be taken
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Frames accepted so far
    pub fn offered(&self) -> u64 {
        self.offered.load(Ordering::Relaxed)
    }

    /// Frames replaced before the worker could take them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
