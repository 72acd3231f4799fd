use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::AppResult;

use super::models::{
    DeleteMode, FileAttachment, FolderId, FolderSelector, MailMessage, MessageRef,
    OutgoingMessage, SearchFilter, SearchPage, Subscription,
};

/// Capability set of the remote mailbox consumed by both pipelines.
#[async_trait]
pub trait MailboxService: Send + Sync {
    async fn resolve_folder(&self, selector: &FolderSelector) -> AppResult<FolderId>;

    async fn subscribe(&self, folder: &FolderId) -> AppResult<Subscription>;

    async fn open_connection(&self, subscription: &Subscription) -> AppResult<Connection>;

    async fn bind_message(&self, message: &MessageRef) -> AppResult<MailMessage>;

    /// Time-ascending search over `folder`.
    async fn search(
        &self,
        folder: &FolderId,
        filter: &SearchFilter,
        page_size: u32,
        offset: u32,
    ) -> AppResult<SearchPage>;

    async fn delete_message(&self, message: &MessageRef, mode: DeleteMode) -> AppResult<()>;

    async fn send(&self, message: &OutgoingMessage) -> AppResult<()>;

    async fn load_attachment_bytes(
        &self,
        message: &MessageRef,
        attachment: &FileAttachment,
    ) -> AppResult<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Notification(Vec<MessageRef>),
    Error(String),
    Disconnected(Option<String>),
}

/// Live notification connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct Connection {
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    task: Option<AbortHandle>,
}

impl Connection {
    pub fn new(events: mpsc::UnboundedReceiver<ConnectionEvent>, task: Option<AbortHandle>) -> Self {
        Self { events, task }
    }

    /// Yields `None` once every sender is gone, which counts as a disconnect.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    pub fn close(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.abort();
    }
}
