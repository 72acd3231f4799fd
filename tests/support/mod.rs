#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mailpipe::api::models::{
    Attachment, DeleteMode, EmailAddress, FileAttachment, FolderId, FolderSelector, ItemId,
    MailMessage, MessageRef, OutgoingMessage, SearchFilter, SearchPage, Subscription,
};
use mailpipe::api::{Connection, ConnectionEvent, MailboxService};
use mailpipe::error::{AppError, AppResult};
use tokio::sync::mpsc;

/// In-memory mailbox. Every call is recorded so tests can assert on it.
#[derive(Default)]
pub struct FakeMailbox {
    messages: Mutex<HashMap<String, MailMessage>>,
    listing: Mutex<Vec<MessageRef>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
    connections: Mutex<Vec<mpsc::UnboundedSender<ConnectionEvent>>>,
    pub open_failures: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub bind_calls: AtomicUsize,
    pub fail_delete: AtomicBool,
    pub fail_send: AtomicBool,
    pub searches: Mutex<Vec<u32>>,
    pub deleted: Mutex<Vec<(String, DeleteMode)>>,
    pub sent: Mutex<Vec<OutgoingMessage>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the message and lists it in search results.
    pub fn add_message(&self, message: MailMessage, unique_id: &str) -> MessageRef {
        let message_ref = MessageRef::new(message.id.as_str(), unique_id);
        self.listing.lock().unwrap().push(message_ref.clone());
        self.messages
            .lock()
            .unwrap()
            .insert(message.id.0.clone(), message);
        message_ref
    }

    pub fn add_attachment_bytes(&self, attachment_id: &str, bytes: &[u8]) {
        self.attachments
            .lock()
            .unwrap()
            .insert(attachment_id.to_string(), bytes.to_vec());
    }

    /// Sends an event on the most recently opened connection.
    pub fn emit(&self, event: ConnectionEvent) {
        let connections = self.connections.lock().unwrap();
        let sender = connections.last().expect("an open connection");
        let _ = sender.send(event);
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn search_offsets(&self) -> Vec<u32> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailboxService for FakeMailbox {
    async fn resolve_folder(&self, selector: &FolderSelector) -> AppResult<FolderId> {
        match selector {
            FolderSelector::Id(id) => Ok(FolderId(id.clone())),
            FolderSelector::Name(name) => Ok(FolderId(name.to_lowercase())),
        }
    }

    async fn subscribe(&self, folder: &FolderId) -> AppResult<Subscription> {
        Ok(Subscription {
            id: "sub-1".to_string(),
            folder: folder.clone(),
        })
    }

    async fn open_connection(&self, _subscription: &Subscription) -> AppResult<Connection> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .open_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Api("service unavailable".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().unwrap().push(tx);
        Ok(Connection::new(rx, None))
    }

    async fn bind_message(&self, message: &MessageRef) -> AppResult<MailMessage> {
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        self.messages
            .lock()
            .unwrap()
            .get(message.id.as_str())
            .cloned()
            .ok_or_else(|| AppError::Api(format!("message {} not found", message.id)))
    }

    async fn search(
        &self,
        _folder: &FolderId,
        filter: &SearchFilter,
        page_size: u32,
        offset: u32,
    ) -> AppResult<SearchPage> {
        self.searches.lock().unwrap().push(offset);
        if *filter == SearchFilter::MatchNothing {
            return Ok(SearchPage::default());
        }

        let listing = self.listing.lock().unwrap();
        let start = (offset as usize).min(listing.len());
        let end = (start + page_size as usize).min(listing.len());
        let more_available = end < listing.len();

        Ok(SearchPage {
            items: listing[start..end].to_vec(),
            more_available,
            next_offset: more_available.then_some(end as u32),
            total_count: Some(listing.len() as u32),
        })
    }

    async fn delete_message(&self, message: &MessageRef, mode: DeleteMode) -> AppResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::Api("delete refused".to_string()));
        }

        self.deleted
            .lock()
            .unwrap()
            .push((message.id.0.clone(), mode));
        Ok(())
    }

    async fn send(&self, message: &OutgoingMessage) -> AppResult<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(AppError::Api("send refused".to_string()));
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn load_attachment_bytes(
        &self,
        _message: &MessageRef,
        attachment: &FileAttachment,
    ) -> AppResult<Vec<u8>> {
        self.attachments
            .lock()
            .unwrap()
            .get(&attachment.id)
            .cloned()
            .ok_or_else(|| AppError::Api(format!("attachment {} unavailable", attachment.id)))
    }
}

pub fn file_attachment(id: &str, name: &str) -> Attachment {
    Attachment::File(FileAttachment {
        id: id.to_string(),
        name: name.to_string(),
        content_type: None,
        content_id: None,
        content_location: None,
        size: 0,
        is_inline: false,
    })
}

pub fn message(id: &str, subject: &str, attachments: Vec<Attachment>) -> MailMessage {
    MailMessage {
        id: ItemId(id.to_string()),
        subject: subject.to_string(),
        from: Some(EmailAddress::named("Sender", "sender@example.com")),
        to: vec![EmailAddress::new("ops@example.com")],
        cc: vec![],
        bcc: vec![],
        body: "<p>hello</p>".to_string(),
        received_at: Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap(),
        attachments,
    }
}

pub fn refs(ids: &[&str]) -> Vec<MessageRef> {
    ids.iter()
        .map(|id| MessageRef::new(*id, format!("<{id}@example.com>")))
        .collect()
}

/// Polls `check` until it holds, failing the test after a few seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
