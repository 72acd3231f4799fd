use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Settings;
use crate::error::{AppError, AppResult};

use super::messages;
use super::models::{
    Attachment, DeleteMode, EmailAddress, FileAttachment, FolderId, FolderSelector, Importance,
    ItemAttachment, ItemId, MailMessage, MessageRef, OutgoingMessage, ReferenceAttachment,
    SearchFilter, SearchPage, Subscription,
};
use super::notifications;
use super::service::{Connection, MailboxService};

/// Mailbox service backed by the Microsoft Graph REST API.
#[derive(Debug, Clone)]
pub struct GraphMailbox {
    http: Client,
    base_url: String,
    api_version: String,
    root: String,
    access_token: String,
    pub(crate) poll_interval: Duration,
    pub(crate) lifetime: Duration,
}

impl GraphMailbox {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        Url::parse(settings.endpoint())?;

        Ok(Self {
            http: Client::new(),
            base_url: settings.endpoint().to_string(),
            api_version: settings.api_version().to_string(),
            root: messages::mailbox_root(settings.mailbox()),
            access_token: settings.access_token()?.to_string(),
            poll_interval: settings.poll_interval(),
            lifetime: settings.lifetime(),
        })
    }

    pub(crate) fn root(&self) -> &str {
        &self.root
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Option<&[(String, String)]>,
    ) -> AppResult<T> {
        let url = self.endpoint_url(endpoint)?;
        let mut request = self.http.get(url);
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }

    /// Follows an absolute link handed out by the API (next/delta links).
    pub(crate) async fn get_link<T: DeserializeOwned>(&self, link: &str) -> AppResult<T> {
        let url = Url::parse(link)?;
        let response = self.execute(self.http.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize>(&self, endpoint: &str, body: &B) -> AppResult<Response> {
        let url = self.endpoint_url(endpoint)?;
        self.execute(self.http.post(url).json(body)).await
    }

    async fn execute(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_api_error(status, &body))
    }

    fn endpoint_url(&self, endpoint: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.set_path(&format!(
            "{}/{}",
            self.api_version.trim_matches('/'),
            endpoint.trim_start_matches('/')
        ));
        Ok(url)
    }

    async fn find_folder_by_name(&self, name: &str) -> AppResult<FolderId> {
        let endpoint = messages::folder_list_endpoint(&self.root);
        let query = messages::folder_lookup_query(name);
        let list: GraphFolderList = self.get_json(&endpoint, Some(&query)).await?;

        list.value
            .into_iter()
            .next()
            .map(|folder| FolderId(folder.id))
            .ok_or_else(|| AppError::Startup(format!("mail folder `{name}` was not found")))
    }
}

#[async_trait]
impl MailboxService for GraphMailbox {
    async fn resolve_folder(&self, selector: &FolderSelector) -> AppResult<FolderId> {
        let name = match selector {
            FolderSelector::Id(id) => return Ok(FolderId(id.clone())),
            FolderSelector::Name(name) => name,
        };

        let Some(alias) = messages::well_known_folder(name) else {
            return self.find_folder_by_name(name).await;
        };

        let endpoint = messages::folder_endpoint(&self.root, alias);
        let folder: GraphFolder = self.get_json(&endpoint, None).await?;
        Ok(FolderId(folder.id))
    }

    async fn subscribe(&self, folder: &FolderId) -> AppResult<Subscription> {
        Ok(Subscription {
            id: format!("delta:{folder}"),
            folder: folder.clone(),
        })
    }

    async fn open_connection(&self, subscription: &Subscription) -> AppResult<Connection> {
        notifications::open(self, &subscription.folder).await
    }

    async fn bind_message(&self, message: &MessageRef) -> AppResult<MailMessage> {
        let endpoint = messages::message_endpoint(&self.root, message.id.as_str());
        let query = messages::bind_query();
        let resource: GraphMessageResource = self.get_json(&endpoint, Some(&query)).await?;
        Ok(resource.into_message())
    }

    async fn search(
        &self,
        folder: &FolderId,
        filter: &SearchFilter,
        page_size: u32,
        offset: u32,
    ) -> AppResult<SearchPage> {
        let Some(query) = messages::search_query(filter, page_size, offset) else {
            return Ok(SearchPage::default());
        };

        let endpoint = messages::folder_messages_endpoint(&self.root, &folder.0);
        let list: GraphMessageList = self.get_json(&endpoint, Some(&query)).await?;
        let items = list
            .value
            .into_iter()
            .map(GraphMessageIdResource::into_ref)
            .collect::<Vec<_>>();

        let more_available = list.next_link.is_some();
        let next_offset = more_available.then(|| offset + items.len() as u32);

        Ok(SearchPage {
            items,
            more_available,
            next_offset,
            total_count: list.count,
        })
    }

    async fn delete_message(&self, message: &MessageRef, mode: DeleteMode) -> AppResult<()> {
        let id = message.id.as_str();
        match mode {
            DeleteMode::Hard => {
                let endpoint = messages::permanent_delete_endpoint(&self.root, id);
                self.post_json(&endpoint, &serde_json::json!({})).await?;
            }
            DeleteMode::Soft => {
                let url = self.endpoint_url(&messages::message_endpoint(&self.root, id))?;
                self.execute(self.http.delete(url)).await?;
            }
            DeleteMode::Move => {
                let endpoint = messages::move_endpoint(&self.root, id);
                let body = GraphMoveRequest {
                    destination_id: "deleteditems".to_string(),
                };
                self.post_json(&endpoint, &body).await?;
            }
        }

        Ok(())
    }

    async fn send(&self, message: &OutgoingMessage) -> AppResult<()> {
        let endpoint = messages::send_endpoint(&self.root);
        let request = GraphSendMailRequest {
            message: GraphOutgoingMessage::from_message(message),
            save_to_sent_items: true,
        };
        self.post_json(&endpoint, &request).await?;
        Ok(())
    }

    async fn load_attachment_bytes(
        &self,
        message: &MessageRef,
        attachment: &FileAttachment,
    ) -> AppResult<Vec<u8>> {
        let endpoint =
            messages::attachment_value_endpoint(&self.root, message.id.as_str(), &attachment.id);
        let url = self.endpoint_url(&endpoint)?;
        let response = self.execute(self.http.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct GraphFolder {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphFolderList {
    value: Vec<GraphFolder>,
}

#[derive(Debug, Deserialize)]
struct GraphMessageList {
    value: Vec<GraphMessageIdResource>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.count")]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphMessageIdResource {
    pub(crate) id: String,
    #[serde(rename = "internetMessageId")]
    pub(crate) internet_message_id: Option<String>,
}

impl GraphMessageIdResource {
    pub(crate) fn into_ref(self) -> MessageRef {
        let unique_id = self
            .internet_message_id
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());
        MessageRef::new(self.id, unique_id)
    }
}

#[derive(Debug, Deserialize)]
struct GraphMessageResource {
    id: String,
    subject: Option<String>,
    from: Option<GraphRecipient>,
    #[serde(rename = "toRecipients", default)]
    to_recipients: Vec<GraphRecipient>,
    #[serde(rename = "ccRecipients", default)]
    cc_recipients: Vec<GraphRecipient>,
    #[serde(rename = "bccRecipients", default)]
    bcc_recipients: Vec<GraphRecipient>,
    body: Option<GraphItemBody>,
    #[serde(rename = "receivedDateTime")]
    received_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    attachments: Vec<GraphAttachmentResource>,
}

impl GraphMessageResource {
    fn into_message(self) -> MailMessage {
        MailMessage {
            id: ItemId(self.id),
            subject: self.subject.unwrap_or_default(),
            from: self.from.and_then(GraphRecipient::into_address),
            to: addresses(self.to_recipients),
            cc: addresses(self.cc_recipients),
            bcc: addresses(self.bcc_recipients),
            body: self
                .body
                .and_then(|body| body.content)
                .unwrap_or_default(),
            received_at: self.received_date_time.unwrap_or_else(Utc::now),
            attachments: self
                .attachments
                .into_iter()
                .map(GraphAttachmentResource::into_attachment)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphAttachmentResource {
    #[serde(rename = "@odata.type")]
    odata_type: Option<String>,
    id: String,
    name: Option<String>,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(rename = "isInline", default)]
    is_inline: bool,
    #[serde(rename = "contentId")]
    content_id: Option<String>,
    #[serde(rename = "contentLocation")]
    content_location: Option<String>,
    #[serde(rename = "sourceUrl")]
    source_url: Option<String>,
}

impl GraphAttachmentResource {
    fn into_attachment(self) -> Attachment {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        match self.odata_type.as_deref() {
            Some("#microsoft.graph.itemAttachment") => Attachment::Item(ItemAttachment {
                id: self.id,
                name,
                content_type: self.content_type,
                size: self.size,
            }),
            Some("#microsoft.graph.referenceAttachment") => {
                Attachment::Reference(ReferenceAttachment {
                    id: self.id,
                    name,
                    content_type: self.content_type,
                    size: self.size,
                    source_url: self.source_url,
                })
            }
            _ => Attachment::File(FileAttachment {
                id: self.id,
                name,
                content_type: self.content_type,
                content_id: self.content_id,
                content_location: self.content_location,
                size: self.size,
                is_inline: self.is_inline,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct GraphRecipient {
    #[serde(rename = "emailAddress")]
    email_address: GraphEmailAddress,
}

impl GraphRecipient {
    fn from_address(address: &EmailAddress) -> Self {
        Self {
            email_address: GraphEmailAddress {
                name: address.name.clone().filter(|name| !name.is_empty()),
                address: Some(address.address.clone()),
            },
        }
    }

    fn into_address(self) -> Option<EmailAddress> {
        let address = self.email_address.address?.trim().to_string();
        if address.is_empty() {
            return None;
        }

        Some(EmailAddress {
            name: self
                .email_address
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            address,
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct GraphEmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphItemBody {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct GraphMoveRequest {
    #[serde(rename = "destinationId")]
    destination_id: String,
}

#[derive(Debug, Serialize)]
struct GraphSendMailRequest {
    message: GraphOutgoingMessage,
    #[serde(rename = "saveToSentItems")]
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
struct GraphOutgoingMessage {
    subject: String,
    importance: Importance,
    body: GraphOutgoingBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<GraphRecipient>,
    #[serde(rename = "toRecipients")]
    to_recipients: Vec<GraphRecipient>,
    #[serde(rename = "ccRecipients", skip_serializing_if = "Vec::is_empty")]
    cc_recipients: Vec<GraphRecipient>,
    #[serde(rename = "bccRecipients", skip_serializing_if = "Vec::is_empty")]
    bcc_recipients: Vec<GraphRecipient>,
    #[serde(rename = "replyTo", skip_serializing_if = "Vec::is_empty")]
    reply_to: Vec<GraphRecipient>,
}

impl GraphOutgoingMessage {
    fn from_message(message: &OutgoingMessage) -> Self {
        let recipients = |list: &[EmailAddress]| {
            list.iter()
                .map(GraphRecipient::from_address)
                .collect::<Vec<_>>()
        };

        Self {
            subject: message.subject.clone(),
            importance: message.importance,
            body: GraphOutgoingBody {
                content_type: "HTML",
                content: message.html_body.clone(),
            },
            from: message.from.as_ref().map(GraphRecipient::from_address),
            to_recipients: recipients(&message.to),
            cc_recipients: recipients(&message.cc),
            bcc_recipients: recipients(&message.bcc),
            reply_to: recipients(&message.reply_to),
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphOutgoingBody {
    #[serde(rename = "contentType")]
    content_type: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GraphApiErrorEnvelope {
    error: GraphApiError,
}

#[derive(Debug, Deserialize)]
struct GraphApiError {
    code: Option<String>,
    message: Option<String>,
}

fn addresses(recipients: Vec<GraphRecipient>) -> Vec<EmailAddress> {
    recipients
        .into_iter()
        .filter_map(GraphRecipient::into_address)
        .collect()
}

fn map_api_error(status: StatusCode, body: &str) -> AppError {
    let message = parse_api_error_message(body).unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() {
            "no error details in response body".to_string()
        } else {
            body.to_string()
        }
    });

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AppError::Auth(format!(
            "mailbox authorization failed ({status}): {message}. check the access token"
        ));
    }

    AppError::Api(format!("mailbox request failed ({status}): {message}"))
}

fn parse_api_error_message(body: &str) -> Option<String> {
    let envelope = serde_json::from_str::<GraphApiErrorEnvelope>(body).ok()?;
    let mut parts = Vec::new();

    if let Some(message) = envelope.error.message {
        parts.push(message);
    }

    if let Some(code) = envelope.error.code {
        parts.push(format!("code={code}"));
    }

    if parts.is_empty() {
        return None;
    }

    Some(parts.join(", "))
}
