//! Mailbox ingestion: live notifications and catch-up backfill feed one
//! queue, drained by a single download worker.

pub mod backfill;
pub mod download;
pub mod filter;
pub mod pending;
pub mod storage;
pub mod subscription;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::api::MailboxService;
use crate::api::models::MessageRef;
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::queue::{self, QueueSender, SHUTDOWN_GRACE, Shutdown};

use backfill::BackfillScanner;
use download::DownloadWorker;
use filter::MessageFilter;
use pending::PendingBuffer;
use storage::ArtifactStore;
use subscription::SubscriptionManager;

pub struct IngestPipeline {
    queue: QueueSender<MessageRef>,
    subscription: Option<JoinHandle<AppResult<()>>>,
    backfill: Arc<BackfillScanner>,
    worker: JoinHandle<()>,
}

impl IngestPipeline {
    /// Resolves the folder, subscribes, opens the first connection and
    /// starts the initial backfill alongside the download worker. Any
    /// failure before the worker starts aborts startup.
    pub async fn start(
        service: Arc<dyn MailboxService>,
        settings: &Settings,
        shutdown: Shutdown,
    ) -> AppResult<Self> {
        let filter = MessageFilter::from_settings(settings);
        let store = ArtifactStore::new(settings.save_path()?, settings.timestamp);

        let selector = settings.folder();
        let folder = service
            .resolve_folder(&selector)
            .await
            .map_err(|err| AppError::Startup(format!("unable to resolve the folder: {err}")))?;
        info!("watching folder {}", folder.0);

        let (queue, receiver) = queue::work_queue();
        let pending = Arc::new(PendingBuffer::new());
        // Armed before the first connection so early live events wait for
        // the initial backfill.
        pending.begin();

        let scanner = Arc::new(BackfillScanner::new(
            Arc::clone(&service),
            folder.clone(),
            filter.search_filter(),
            queue.clone(),
            pending,
            shutdown.clone(),
        ));

        let subscription = service
            .subscribe(&folder)
            .await
            .map_err(|err| AppError::Startup(format!("unable to subscribe: {err}")))?;

        let mut manager = SubscriptionManager::new(
            Arc::clone(&service),
            subscription,
            queue.clone(),
            Arc::clone(&scanner),
            shutdown.clone(),
        );
        let connection = manager.open().await?;

        let subscription = tokio::spawn(manager.run(connection));
        scanner.spawn_armed();

        let worker = DownloadWorker::new(
            service,
            receiver,
            shutdown,
            filter,
            store,
            settings.delete_mode,
        );
        let worker = tokio::spawn(worker.run());

        info!("ingestion started");
        Ok(Self {
            queue,
            subscription: Some(subscription),
            backfill: scanner,
            worker,
        })
    }

    /// Resolves when the subscription gives up. Pending forever while it is
    /// healthy or after it has already been awaited.
    pub async fn failed(&mut self) -> AppError {
        let Some(handle) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };

        let result = handle.await;
        self.subscription = None;
        match result {
            Ok(Err(err)) => err,
            Ok(Ok(())) => std::future::pending().await,
            Err(err) => AppError::Api(format!("subscription task failed: {err}")),
        }
    }

    /// Closes the queue and gives each task the shutdown grace to finish.
    /// The shared shutdown signal must be triggered by the caller.
    pub async fn stop(self) {
        self.queue.close();

        if let Some(handle) = self.subscription {
            queue::join_within("subscription", handle, SHUTDOWN_GRACE).await;
        }
        // The initial scan or the latest catch-up scan after a reconnect.
        if let Some(handle) = self.backfill.take_task() {
            let report = queue::join_within("backfill", handle, SHUTDOWN_GRACE).await;
            if let Some(report) = report.filter(|report| !report.completed) {
                info!("backfill interrupted after {} messages", report.enqueued);
            }
        }
        queue::join_within("downloader", self.worker, SHUTDOWN_GRACE).await;

        info!("ingestion stopped");
    }
}
