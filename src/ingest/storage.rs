use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::api::models::{Attachment, EmailAddress, FileAttachment, MailMessage};
use crate::error::AppResult;

pub const METADATA_FILE: &str = "email.json";

/// Local filesystem layout for downloaded messages.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    save_path: PathBuf,
    timestamp: bool,
}

impl ArtifactStore {
    pub fn new(save_path: PathBuf, timestamp: bool) -> Self {
        Self {
            save_path,
            timestamp,
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// The save path itself, or a per-message directory named after the
    /// transaction id.
    pub fn prepare_dir(&self, transaction: Option<&str>) -> AppResult<PathBuf> {
        let dir = match transaction {
            Some(transaction) => self.save_path.join(transaction),
            None => self.save_path.clone(),
        };

        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn attachment_path(&self, dir: &Path, received_at: DateTime<Utc>, name: &str) -> PathBuf {
        let name = sanitize_file_name(name);
        if self.timestamp {
            dir.join(format!("{}@{name}", received_at.timestamp()))
        } else {
            dir.join(name)
        }
    }

    pub fn write_attachment(
        &self,
        dir: &Path,
        message: &MailMessage,
        attachment: &FileAttachment,
        bytes: &[u8],
    ) -> AppResult<PathBuf> {
        let path = self.attachment_path(dir, message.received_at, &attachment.name);
        fs::write(&path, bytes)?;

        // The content is saved either way; a wrong mtime is only worth a warning.
        if let Err(err) = stamp_modified(&path, message.received_at) {
            warn!("unable to set the modified time of {}: {err}", path.display());
        }

        Ok(path)
    }

    pub fn write_metadata(&self, dir: &Path, message: &MailMessage) -> AppResult<PathBuf> {
        let path = dir.join(METADATA_FILE);
        let record = MetadataRecord::from_message(message);
        let payload = serde_json::to_string_pretty(&record)?;
        fs::write(&path, payload)?;
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord<'a> {
    pub id: &'a str,
    pub received_at: DateTime<Utc>,
    pub subject: &'a str,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub body: &'a str,
    pub attachments: Vec<AttachmentRecord<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord<'a> {
    pub id: &'a str,
    pub content_id: Option<&'a str>,
    pub content_location: Option<&'a str>,
    pub content_type: String,
    pub name: &'a str,
    pub size: u64,
}

impl<'a> MetadataRecord<'a> {
    pub fn from_message(message: &'a MailMessage) -> Self {
        let render = |list: &[EmailAddress]| -> Vec<String> {
            list.iter().map(ToString::to_string).collect()
        };

        Self {
            id: message.id.as_str(),
            received_at: message.received_at,
            subject: &message.subject,
            from: message.from.as_ref().map(ToString::to_string),
            to: render(&message.to),
            cc: render(&message.cc),
            bcc: render(&message.bcc),
            body: &message.body,
            attachments: message
                .attachments
                .iter()
                .map(AttachmentRecord::from_attachment)
                .collect(),
        }
    }
}

impl<'a> AttachmentRecord<'a> {
    fn from_attachment(attachment: &'a Attachment) -> Self {
        let (content_id, content_location) = match attachment {
            Attachment::File(file) => (
                file.content_id.as_deref(),
                file.content_location.as_deref(),
            ),
            _ => (None, None),
        };

        let content_type = attachment
            .content_type()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| {
                mime_guess::from_path(attachment.name())
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });

        Self {
            id: attachment.id(),
            content_id,
            content_location,
            content_type,
            name: attachment.name(),
            size: attachment.size(),
        }
    }
}

fn stamp_modified(path: &Path, when: DateTime<Utc>) -> io::Result<()> {
    let file = File::options().write(true).open(path)?;
    file.set_modified(SystemTime::from(when))
}

/// Reduces an attachment name to a single, non-empty path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = name
        .trim()
        .chars()
        .map(|value| match value {
            '/' | '\\' | ':' | '\0' => '_',
            value if value.is_control() => '_',
            value => value,
        })
        .collect::<String>();

    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::api::models::{ItemAttachment, ItemId};

    fn message() -> MailMessage {
        MailMessage {
            id: ItemId("AAMk-1".to_string()),
            subject: "Invoice".to_string(),
            from: Some(EmailAddress::named("Billing", "billing@example.com")),
            to: vec![EmailAddress::new("ops@example.com")],
            cc: vec![],
            bcc: vec![],
            body: "<p>see attached</p>".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap(),
            attachments: vec![
                Attachment::File(FileAttachment {
                    id: "att-1".to_string(),
                    name: "report.pdf".to_string(),
                    content_type: None,
                    content_id: Some("cid-1".to_string()),
                    content_location: None,
                    size: 3,
                    is_inline: false,
                }),
                Attachment::Item(ItemAttachment {
                    id: "att-2".to_string(),
                    name: "forwarded".to_string(),
                    content_type: Some("message/rfc822".to_string()),
                    size: 10,
                }),
            ],
        }
    }

    #[test]
    fn prefixes_received_time_when_timestamping() {
        let store = ArtifactStore::new(PathBuf::from("/srv/mail"), true);
        let received = Utc.with_ymd_and_hms(2026, 2, 16, 10, 0, 0).unwrap();

        assert_eq!(
            store.attachment_path(Path::new("/srv/mail"), received, "a.pdf"),
            PathBuf::from("/srv/mail/1771236000@a.pdf")
        );
    }

    #[test]
    fn sanitizes_path_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("  "), "attachment");
        assert_eq!(sanitize_file_name(".."), "attachment");
    }

    #[test]
    fn metadata_record_uses_camel_case_and_guesses_content_type() {
        let message = message();
        let value = serde_json::to_value(MetadataRecord::from_message(&message)).expect("json");

        assert_eq!(value["id"], "AAMk-1");
        assert_eq!(value["receivedAt"], "2026-02-16T10:00:00Z");
        assert_eq!(value["from"], "Billing <billing@example.com>");
        assert_eq!(value["to"][0], "ops@example.com");
        assert_eq!(value["attachments"][0]["contentId"], "cid-1");
        assert_eq!(value["attachments"][0]["contentType"], "application/pdf");
        assert_eq!(value["attachments"][1]["contentType"], "message/rfc822");
        assert!(value["attachments"][1]["contentLocation"].is_null());
    }

    #[test]
    fn writes_attachment_with_received_mtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path().to_path_buf(), false);
        let message = message();
        let Some(file) = message.file_attachments().next() else {
            panic!("fixture has a file attachment");
        };

        let path = store
            .write_attachment(dir.path(), &message, file, b"pdf")
            .expect("write attachment");

        assert_eq!(fs::read(&path).expect("read back"), b"pdf");
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .expect("mtime");
        assert_eq!(modified, SystemTime::from(message.received_at));
    }

    #[test]
    fn mtime_failure_does_not_fail_the_saved_attachment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let message = message();

        // A path that cannot be opened for writing.
        assert!(stamp_modified(dir.path(), message.received_at).is_err());

        let store = ArtifactStore::new(dir.path().to_path_buf(), true);
        let Some(file) = message.file_attachments().next() else {
            panic!("fixture has a file attachment");
        };
        let path = store
            .write_attachment(dir.path(), &message, file, b"pdf")
            .expect("write attachment");
        assert_eq!(fs::read(&path).expect("read back"), b"pdf");
    }
}
