use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::MailboxService;
use crate::api::models::{FolderId, MessageRef, SearchFilter};
use crate::error::AppResult;
use crate::queue::{QueueSender, Shutdown};

use super::pending::PendingBuffer;

pub const PAGE_SIZE: u32 = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub enqueued: usize,
    pub flushed: usize,
    pub completed: bool,
}

/// Catch-up scan over the folder, oldest first.
pub struct BackfillScanner {
    service: Arc<dyn MailboxService>,
    folder: FolderId,
    filter: SearchFilter,
    queue: QueueSender<MessageRef>,
    pending: Arc<PendingBuffer>,
    shutdown: Shutdown,
    task: Mutex<Option<JoinHandle<BackfillReport>>>,
}

impl BackfillScanner {
    pub fn new(
        service: Arc<dyn MailboxService>,
        folder: FolderId,
        filter: SearchFilter,
        queue: QueueSender<MessageRef>,
        pending: Arc<PendingBuffer>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            service,
            folder,
            filter,
            queue,
            pending,
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn pending(&self) -> &Arc<PendingBuffer> {
        &self.pending
    }

    /// Starts a scan on its own task unless one is already in progress.
    pub fn try_start(self: &Arc<Self>) -> bool {
        if !self.pending.begin() {
            return false;
        }

        self.spawn_armed();
        true
    }

    /// Spawns a scan for a pending buffer the caller has already armed.
    pub fn spawn_armed(self: &Arc<Self>) {
        let scanner = Arc::clone(self);
        let handle = tokio::spawn(async move { scanner.run().await });
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Hands over the most recently spawned scan, if any.
    pub fn take_task(&self) -> Option<JoinHandle<BackfillReport>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Runs one scan. The caller must have armed the pending buffer; it is
    /// flushed and disarmed whatever the scan's outcome.
    pub async fn run(&self) -> BackfillReport {
        let mut enqueued = 0;
        let completed = match self.scan(&mut enqueued).await {
            Ok(completed) => completed,
            Err(err) => {
                warn!("backfill stopped after {enqueued} messages: {err}");
                false
            }
        };

        let flushed = self.pending.finish(&self.queue);
        if flushed > 0 {
            info!("enqueued {flushed} messages that arrived during the backfill");
        }
        if completed {
            info!("backfill enqueued {enqueued} messages");
        }

        BackfillReport {
            enqueued,
            flushed,
            completed,
        }
    }

    async fn scan(&self, enqueued: &mut usize) -> AppResult<bool> {
        if self.filter == SearchFilter::MatchNothing {
            debug!("backfill skipped: body capture without subject filters matches nothing");
            return Ok(true);
        }

        let mut offset = 0;
        loop {
            if self.shutdown.is_triggered() || self.queue.is_closed() {
                return Ok(false);
            }

            debug!("searching for {PAGE_SIZE} old messages at offset {offset}");
            let page = self
                .service
                .search(&self.folder, &self.filter, PAGE_SIZE, offset)
                .await?;

            match page.total_count {
                Some(total) if page.more_available => debug!(
                    "found {} old messages, more available ({total} total)",
                    page.items.len()
                ),
                _ => debug!("found {} old messages", page.items.len()),
            }

            for item in page.items {
                if !self.queue.push(item) {
                    return Ok(false);
                }
                *enqueued += 1;
            }

            match page.next_offset {
                Some(next) if next > offset => offset = next,
                Some(next) => {
                    warn!("search returned a non-advancing offset {next}; ending backfill");
                    return Ok(true);
                }
                None => return Ok(true),
            }
        }
    }
}
