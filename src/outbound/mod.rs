//! Outbound mail: `.email` files dropped into the input directory are
//! parsed, sent and removed.

pub mod format;
pub mod sender;
pub mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::api::MailboxService;
use crate::config::Settings;
use crate::error::AppResult;
use crate::queue::{self, QueueSender, SHUTDOWN_GRACE, Shutdown};

use sender::SendWorker;
use watcher::OutboundWatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundItem {
    pub path: PathBuf,
    /// Set on the single retry after a read failure.
    pub requeued: bool,
}

impl OutboundItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            requeued: false,
        }
    }

    pub fn requeue(self) -> Self {
        Self {
            requeued: true,
            ..self
        }
    }
}

pub struct OutboundPipeline {
    queue: QueueSender<OutboundItem>,
    watcher: OutboundWatcher,
    worker: JoinHandle<()>,
}

impl OutboundPipeline {
    pub fn start(
        service: Arc<dyn MailboxService>,
        settings: &Settings,
        shutdown: Shutdown,
    ) -> AppResult<Self> {
        let dir = settings.input_path()?;
        let (queue, receiver) = queue::work_queue();

        let watcher = OutboundWatcher::start(dir, queue.clone())?;
        let worker = SendWorker::new(service, receiver, queue.clone(), shutdown);
        let worker = tokio::spawn(worker.run());

        info!("outbound started");
        Ok(Self {
            queue,
            watcher,
            worker,
        })
    }

    pub async fn stop(self) {
        self.queue.close();
        self.watcher.stop();
        queue::join_within("sender", self.worker, SHUTDOWN_GRACE).await;

        info!("outbound stopped");
    }
}
