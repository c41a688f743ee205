//! Capture output bindings
//!
//! Tracks which delegate and queue each capture output delivers to. Shared
//! by every `CaptureSession` implementation.
//!
//! Late video frames are discarded: once the delegate falls behind by
//! `MAX_VIDEO_IN_FLIGHT` frames, new frames are dropped at the source instead
//! of queueing. Audio is always delivered.

use super::queue::SerialQueue;
use super::traits::{MediaKind, SampleBuffer, SampleBufferDelegate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Video frames queued or being handled before new ones are discarded
pub const MAX_VIDEO_IN_FLIGHT: usize = 2;

struct Binding {
    delegate: Weak<dyn SampleBufferDelegate>,
    queue: SerialQueue,
    in_flight: Arc<AtomicUsize>,
}

#[derive(Default)]
pub struct OutputBindings {
    video: Mutex<Option<Binding>>,
    audio: Mutex<Option<Binding>>,
    late_frames: AtomicU64,
}

impl OutputBindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, output: MediaKind) -> &Mutex<Option<Binding>> {
        match output {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub fn bind(&self, output: MediaKind, delegate: Weak<dyn SampleBufferDelegate>, queue: &SerialQueue) {
        *self.slot(output).lock() = Some(Binding {
            delegate,
            queue: queue.clone(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        });
        tracing::debug!("Bound {} output to queue '{}'", output, queue.label());
    }

    /// Video frames discarded as late so far
    pub fn late_frames(&self) -> u64 {
        self.late_frames.load(Ordering::Relaxed)
    }

    /// Hand `buffer` to the delegate bound to `output`, on its queue.
    /// Returns false when nothing is bound, the queue is gone, or the
    /// buffer was a late video frame.
    pub fn deliver(&self, output: MediaKind, buffer: SampleBuffer) -> bool {
        let guard = self.slot(output).lock();
        let Some(binding) = guard.as_ref() else {
            return false;
        };

        let queued = binding.in_flight.fetch_add(1, Ordering::SeqCst);
        if output == MediaKind::Video && queued >= MAX_VIDEO_IN_FLIGHT {
            binding.in_flight.fetch_sub(1, Ordering::SeqCst);
            let late = self.late_frames.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                "Discarding late video frame at {:?} ({} discarded)",
                buffer.presentation_timestamp(),
                late
            );
            return false;
        }

        let delegate = binding.delegate.clone();
        let in_flight = binding.in_flight.clone();
        let dispatched = binding.queue.dispatch(move || {
            if let Some(delegate) = delegate.upgrade() {
                delegate.capture_output(output, buffer);
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
        if !dispatched {
            binding.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        dispatched
    }
}
