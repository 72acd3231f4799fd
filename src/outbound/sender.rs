use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::MailboxService;
use crate::api::models::OutgoingMessage;
use crate::error::AppResult;
use crate::queue::{DedupCache, QueueReceiver, QueueSender, Shutdown};

use super::OutboundItem;
use super::format;

pub const READ_RETRIES: u32 = 3;
pub const READ_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Duplicate,
    /// The file could not be read and went back on the queue.
    Requeued,
    /// A requeued file that still could not be read; it stays on disk.
    Dropped,
    /// Empty or invalid content; the file stays on disk.
    Discarded,
    Attempted { delivered: bool, deleted: bool },
}

/// Sole consumer of the outbound queue.
pub struct SendWorker {
    service: Arc<dyn MailboxService>,
    queue: QueueReceiver<OutboundItem>,
    requeue: QueueSender<OutboundItem>,
    shutdown: Shutdown,
    cache: DedupCache<PathBuf>,
    retry_delay: Duration,
}

impl SendWorker {
    pub fn new(
        service: Arc<dyn MailboxService>,
        queue: QueueReceiver<OutboundItem>,
        requeue: QueueSender<OutboundItem>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            service,
            queue,
            requeue,
            shutdown,
            cache: DedupCache::default(),
            retry_delay: READ_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub async fn run(mut self) {
        while let Some(item) = self.queue.take(&self.shutdown).await {
            self.process(item).await;
        }

        info!("sender stopped");
    }

    pub async fn process(&mut self, item: OutboundItem) -> SendOutcome {
        // A requeued item is already in the cache; it must not be skipped.
        if !item.requeued {
            if self.cache.seen(&item.path) {
                debug!("ignoring a duplicate outbound file {}", item.path.display());
                return SendOutcome::Duplicate;
            }
            self.cache.record(item.path.clone());
        }

        let raw = match self.read(&item.path).await {
            Ok(raw) => raw,
            Err(err) if item.requeued => {
                warn!(
                    "giving up on {} after a second read failure: {err}",
                    item.path.display()
                );
                return SendOutcome::Dropped;
            }
            Err(err) => {
                warn!("failed to read {}: {err}; retrying later", item.path.display());
                self.requeue.push(item.requeue());
                return SendOutcome::Requeued;
            }
        };

        if raw.trim().is_empty() {
            debug!("ignoring an empty outbound file {}", item.path.display());
            return SendOutcome::Discarded;
        }

        let message = match format::parse(&raw).and_then(|draft| format::compose(&draft)) {
            Ok(message) => message,
            Err(err) => {
                warn!("discarding {}: {err}", item.path.display());
                return SendOutcome::Discarded;
            }
        };

        let delivered = self.send(&message).await;

        let deleted = match fs::remove_file(&item.path) {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to delete {}: {err}", item.path.display());
                false
            }
        };

        SendOutcome::Attempted { delivered, deleted }
    }

    async fn send(&self, message: &OutgoingMessage) -> bool {
        let recipients = message
            .to
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!("sending '{}' to {recipients}", message.subject);

        match self.service.send(message).await {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to send '{}': {err}", message.subject);
                false
            }
        }
    }

    async fn read(&self, path: &Path) -> AppResult<String> {
        let mut retries = 0;
        loop {
            match fs::read(path) {
                Ok(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) if retries >= READ_RETRIES => return Err(err.into()),
                Err(err) => {
                    retries += 1;
                    debug!("read attempt {retries} of {} failed: {err}", path.display());
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
