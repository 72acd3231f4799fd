use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::models::MessageRef;
use crate::queue::QueueSender;

/// Live notifications held back while a backfill scan is running.
///
/// `Some` exactly while a backfill is in progress. Both the buffering
/// decision and the flush happen under the same lock, so a live event is
/// either buffered before the flush or pushed straight to the queue after it.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    inner: Mutex<Option<Vec<MessageRef>>>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the buffer. `false` if a backfill is already in progress.
    pub fn begin(&self) -> bool {
        let mut inner = self.lock();
        if inner.is_some() {
            return false;
        }

        *inner = Some(Vec::new());
        true
    }

    /// Buffers `item` during a backfill, otherwise pushes it to the queue.
    /// Returns `true` when the item was buffered.
    pub fn offer(&self, item: MessageRef, queue: &QueueSender<MessageRef>) -> bool {
        let mut inner = self.lock();
        match inner.as_mut() {
            Some(buffer) => {
                buffer.push(item);
                true
            }
            None => {
                queue.push(item);
                false
            }
        }
    }

    /// Flushes buffered items in arrival order and disarms the buffer.
    pub fn finish(&self, queue: &QueueSender<MessageRef>) -> usize {
        let mut inner = self.lock();
        let Some(buffer) = inner.take() else {
            return 0;
        };

        let count = buffer.len();
        for item in buffer {
            queue.push(item);
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<MessageRef>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
