use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Opaque remote identifier of a mailbox item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a message produced by a notification or a backfill search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: ItemId,
    pub unique_id: String,
}

impl MessageRef {
    pub fn new(id: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            id: ItemId(id.into()),
            unique_id: unique_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FolderId(pub String);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderSelector {
    Id(String),
    Name(String),
}

/// Logical subscription descriptor. Reconnects reuse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub folder: FolderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub id: ItemId,
    pub subject: String,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

impl MailMessage {
    pub fn file_attachments(&self) -> impl Iterator<Item = &FileAttachment> {
        self.attachments.iter().filter_map(|attachment| match attachment {
            Attachment::File(file) => Some(file),
            _ => None,
        })
    }
}

/// One variant per attachment kind; only file attachments carry bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    File(FileAttachment),
    Item(ItemAttachment),
    Reference(ReferenceAttachment),
}

impl Attachment {
    pub fn id(&self) -> &str {
        match self {
            Attachment::File(file) => &file.id,
            Attachment::Item(item) => &item.id,
            Attachment::Reference(reference) => &reference.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Attachment::File(file) => &file.name,
            Attachment::Item(item) => &item.name,
            Attachment::Reference(reference) => &reference.name,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Attachment::File(file) => file.content_type.as_deref(),
            Attachment::Item(item) => item.content_type.as_deref(),
            Attachment::Reference(reference) => reference.content_type.as_deref(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Attachment::File(file) => file.size,
            Attachment::Item(item) => item.size,
            Attachment::Reference(reference) => reference.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    pub content_location: Option<String>,
    pub size: u64,
    pub is_inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAttachment {
    pub id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAttachment {
    pub id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    #[default]
    Hard,
    Soft,
    Move,
}

impl FromStr for DeleteMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(DeleteMode::Hard),
            "soft" => Ok(DeleteMode::Soft),
            "move" => Ok(DeleteMode::Move),
            other => Err(AppError::Config(format!(
                "unknown delete mode `{other}`; expected hard, soft or move"
            ))),
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeleteMode::Hard => "hard",
            DeleteMode::Soft => "soft",
            DeleteMode::Move => "move",
        };
        f.write_str(label)
    }
}

/// Server-side search criteria for the backfill scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    MatchNothing,
    Criteria {
        has_attachments: bool,
        subject_contains_any: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<MessageRef>,
    pub more_available: bool,
    pub next_offset: Option<u32>,
    pub total_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    pub importance: Importance,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub html_body: String,
}
