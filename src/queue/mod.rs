//! Transfer queues and the shared shutdown signal.
//!
//! Every pipeline has exactly one consumer, so the receiving half is not
//! cloneable. Producers may live on any thread, including non-async
//! callbacks: pushing never blocks.

pub mod dedup;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use dedup::DedupCache;

/// How long a stopping pipeline waits for each of its tasks.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(1337);

/// Cooperative cancellation shared by every task of a run.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

pub fn work_queue<T>() -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));

    (
        QueueSender {
            tx,
            closed: Arc::clone(&closed),
        },
        QueueReceiver { rx, closed },
    )
}

pub struct QueueSender<T> {
    tx: mpsc::UnboundedSender<T>,
    closed: Arc<AtomicBool>,
}

impl<T> QueueSender<T> {
    /// Returns `false` once the queue no longer accepts input.
    pub fn push(&self, item: T) -> bool {
        if self.is_closed() {
            return false;
        }

        self.tx.send(item).is_ok()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct QueueReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    closed: Arc<AtomicBool>,
}

impl<T> QueueReceiver<T> {
    /// Waits for the next item. `None` means the consumer should exit:
    /// shutdown was triggered, the queue was closed, or every sender is gone.
    pub async fn take(&mut self, shutdown: &Shutdown) -> Option<T> {
        if shutdown.is_triggered() || self.closed.load(Ordering::SeqCst) {
            return None;
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    pub fn try_take(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> fmt::Debug for QueueReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Waits up to `grace` for a task to finish. A task still running after that
/// is left detached rather than aborted. Returns the task's output if it
/// finished in time.
pub async fn join_within<T>(name: &str, handle: JoinHandle<T>, grace: Duration) -> Option<T> {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(output)) => {
            debug!("{name} finished");
            Some(output)
        }
        Ok(Err(err)) => {
            warn!("{name} task failed: {err}");
            None
        }
        Err(_) => {
            warn!("{name} did not stop within {grace:?}");
            None
        }
    }
}
