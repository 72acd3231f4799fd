use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::MailboxService;
use crate::api::models::{DeleteMode, MailMessage, MessageRef};
use crate::queue::{DedupCache, QueueReceiver, Shutdown};

use super::filter::MessageFilter;
use super::storage::ArtifactStore;

/// Per-process transaction ids: `<epoch-seconds>@EMAIL_<counter>`.
#[derive(Debug, Clone, Default)]
pub struct TransactionIds {
    counter: u64,
}

impl TransactionIds {
    pub fn allocate(&mut self, now: DateTime<Utc>) -> String {
        self.counter += 1;
        format!("{}@EMAIL_{}", now.timestamp(), self.counter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Duplicate,
    BindFailed,
    NotMatched,
    Processed {
        saved: usize,
        failed: usize,
        metadata: bool,
        deleted: bool,
    },
}

/// Sole consumer of the ingestion queue.
pub struct DownloadWorker {
    service: Arc<dyn MailboxService>,
    queue: QueueReceiver<MessageRef>,
    shutdown: Shutdown,
    cache: DedupCache<String>,
    filter: MessageFilter,
    store: ArtifactStore,
    delete_mode: DeleteMode,
    transactions: TransactionIds,
}

impl DownloadWorker {
    pub fn new(
        service: Arc<dyn MailboxService>,
        queue: QueueReceiver<MessageRef>,
        shutdown: Shutdown,
        filter: MessageFilter,
        store: ArtifactStore,
        delete_mode: DeleteMode,
    ) -> Self {
        Self {
            service,
            queue,
            shutdown,
            cache: DedupCache::default(),
            filter,
            store,
            delete_mode,
            transactions: TransactionIds::default(),
        }
    }

    pub async fn run(mut self) {
        while let Some(message_ref) = self.queue.take(&self.shutdown).await {
            self.process(message_ref).await;
        }

        info!("downloader stopped");
    }

    pub async fn process(&mut self, message_ref: MessageRef) -> DownloadOutcome {
        if self.cache.seen(message_ref.unique_id.as_str()) {
            debug!("ignoring a duplicate message {}", message_ref.unique_id);
            return DownloadOutcome::Duplicate;
        }
        self.cache.record(message_ref.unique_id.clone());

        let message = match self.service.bind_message(&message_ref).await {
            Ok(message) => message,
            Err(err) => {
                warn!("failed to fetch message {}: {err}", message_ref.id);
                return DownloadOutcome::BindFailed;
            }
        };

        let attachment_count = message.attachments.len();
        if !self.filter.matches(&message.subject, attachment_count) {
            debug!("ignoring a message that does not match: {}", message.subject);
            return DownloadOutcome::NotMatched;
        }

        info!("processing a new matching message: {}", message.subject);
        self.download_and_delete(&message_ref, &message).await
    }

    async fn download_and_delete(
        &mut self,
        message_ref: &MessageRef,
        message: &MailMessage,
    ) -> DownloadOutcome {
        let transaction = self
            .filter
            .body_capture()
            .then(|| self.transactions.allocate(Utc::now()));

        let mut saved = 0;
        let mut failed = 0;
        let mut metadata = false;

        match self.store.prepare_dir(transaction.as_deref()) {
            Ok(dir) => {
                for attachment in message.file_attachments() {
                    debug!("downloading an attachment: {}", attachment.name);
                    let written = match self
                        .service
                        .load_attachment_bytes(message_ref, attachment)
                        .await
                    {
                        Ok(bytes) => self.store.write_attachment(&dir, message, attachment, &bytes),
                        Err(err) => Err(err),
                    };

                    match written {
                        Ok(path) => {
                            debug!("saved {}", path.display());
                            saved += 1;
                        }
                        Err(err) => {
                            warn!("failed to download the attachment {}: {err}", attachment.name);
                            failed += 1;
                        }
                    }
                }

                if transaction.is_some() {
                    match self.store.write_metadata(&dir, message) {
                        Ok(_) => metadata = true,
                        Err(err) => warn!("failed to save the message record: {err}"),
                    }
                }
            }
            Err(err) => {
                warn!(
                    "failed to prepare {}: {err}",
                    self.store.save_path().display()
                );
                failed = message.file_attachments().count();
            }
        }

        debug!("deleting the message ({} mode)", self.delete_mode);
        let deleted = match self
            .service
            .delete_message(message_ref, self.delete_mode)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to delete the message {}: {err}", message_ref.id);
                false
            }
        };

        DownloadOutcome::Processed {
            saved,
            failed,
            metadata,
            deleted,
        }
    }
}
