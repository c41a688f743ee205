//! Serial dispatch queue
//!
//! A single named worker thread that runs submitted jobs one at a time, in
//! submission order. Capture sessions deliver every sample buffer through
//! one of these so audio and video callbacks never run concurrently.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a serial queue. Clones share the same worker thread, which
/// exits once every handle has been dropped and the backlog is drained.
#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    tx: mpsc::Sender<Job>,
}

impl SerialQueue {
    /// Spawn the worker thread for a new queue
    pub fn new(label: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();

        thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in rx {
                    job();
                }
                tracing::debug!("Serial queue drained and closed");
            })?;

        tracing::debug!("Serial queue '{}' started", label);

        Ok(Self {
            label: Arc::from(label),
            tx,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue a job. Returns false if the worker thread is gone.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Block until every job dispatched before this call has run.
    ///
    /// Must not be called from the queue's own thread.
    pub fn sync(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        if self.dispatch(move || {
            let _ = done_tx.send(());
        }) {
            let _ = done_rx.recv();
        }
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue").field("label", &self.label).finish()
    }
}
