//! Live notifications over delta queries.
//!
//! A connection primes a delta link for the folder, then polls it on a fixed
//! interval. Every poll that returns new items yields a notification. The
//! connection ends with a disconnect event when its lifetime runs out or a
//! poll fails; the subscription manager decides what happens next.

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::error::{AppError, AppResult};

use super::client::{GraphMailbox, GraphMessageIdResource};
use super::messages;
use super::models::{FolderId, MessageRef};
use super::service::{Connection, ConnectionEvent};

pub(crate) async fn open(mailbox: &GraphMailbox, folder: &FolderId) -> AppResult<Connection> {
    let endpoint = messages::folder_delta_endpoint(mailbox.root(), &folder.0);
    let query = messages::delta_query();
    let first: DeltaPage = mailbox.get_json(&endpoint, Some(&query)).await?;
    // The initial round enumerates the whole folder; the backfill owns that work.
    let (_, delta_link) = drain(mailbox, first).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(poll(mailbox.clone(), delta_link, tx));
    Ok(Connection::new(rx, Some(task.abort_handle())))
}

async fn poll(
    mailbox: GraphMailbox,
    mut delta_link: String,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let deadline = Instant::now() + mailbox.lifetime;

    loop {
        let wake = (Instant::now() + mailbox.poll_interval).min(deadline);
        time::sleep_until(wake).await;

        if Instant::now() >= deadline {
            debug!("notification connection reached its lifetime");
            let _ = events.send(ConnectionEvent::Disconnected(None));
            return;
        }

        let round = match mailbox.get_link::<DeltaPage>(&delta_link).await {
            Ok(page) => drain(&mailbox, page).await,
            Err(err) => Err(err),
        };

        match round {
            Ok((refs, next_link)) => {
                delta_link = next_link;
                if refs.is_empty() {
                    continue;
                }
                if events.send(ConnectionEvent::Notification(refs)).is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = events.send(ConnectionEvent::Disconnected(Some(err.to_string())));
                return;
            }
        }
    }
}

/// Walks next links until the round hands out a fresh delta link.
async fn drain(mailbox: &GraphMailbox, first: DeltaPage) -> AppResult<(Vec<MessageRef>, String)> {
    let mut refs = Vec::new();
    let mut page = first;

    loop {
        refs.extend(
            page.value
                .into_iter()
                .filter(|entry| entry.removed.is_none())
                .map(|entry| entry.resource.into_ref()),
        );

        if let Some(delta_link) = page.delta_link {
            return Ok((refs, delta_link));
        }

        let Some(next_link) = page.next_link else {
            return Err(AppError::Api(
                "delta response carried neither a next link nor a delta link".to_string(),
            ));
        };
        page = mailbox.get_link(&next_link).await?;
    }
}

#[derive(Debug, Deserialize)]
struct DeltaPage {
    #[serde(default)]
    value: Vec<DeltaEntry>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaEntry {
    #[serde(flatten)]
    resource: GraphMessageIdResource,
    #[serde(rename = "@removed")]
    removed: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_page_and_skips_removed_entries() {
        let page: DeltaPage = serde_json::from_str(
            r#"{
                "value": [
                    {"id": "AAMk-1", "internetMessageId": "<one@example.com>"},
                    {"id": "AAMk-2", "@removed": {"reason": "deleted"}}
                ],
                "@odata.deltaLink": "https://graph.microsoft.com/v1.0/me/mailFolders/inbox/messages/delta?$deltatoken=abc"
            }"#,
        )
        .expect("delta page should parse");

        let live = page
            .value
            .into_iter()
            .filter(|entry| entry.removed.is_none())
            .map(|entry| entry.resource.into_ref())
            .collect::<Vec<_>>();

        assert_eq!(live, vec![MessageRef::new("AAMk-1", "<one@example.com>")]);
        assert!(page.delta_link.is_some());
        assert!(page.next_link.is_none());
    }
}
