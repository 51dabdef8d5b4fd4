//! Telegram Bot API transport
//!
//! Receives messages by long-polling `getUpdates` or through a webhook and
//! implements the outbound calls the dispatcher needs.

use crate::db::NoteKind;
use crate::session::{ChatId, MessageRef};
use crate::state_machine::text::utf16_prefix_len;
use crate::state_machine::{Inbound, Keyboard, Media, Sender};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Longest caption Telegram accepts on media, in UTF-16 code units
pub const MAX_CAPTION_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Telegram {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("Failed to parse Telegram response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Envelope around every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

impl Update {
    /// The message this update carries, unless it has none or comes from a
    /// chat other than `admin`
    pub fn accept(self, admin: Option<ChatId>) -> Option<Inbound> {
        let message = self.message?;
        if admin.is_some_and(|admin| admin != message.chat.id) {
            tracing::debug!(chat_id = message.chat.id, "Ignoring message from non-admin chat");
            return None;
        }
        Some(message.into_inbound())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageRef,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<FileRef>>,
    pub video: Option<FileRef>,
    pub voice: Option<FileRef>,
    pub document: Option<FileRef>,
    pub forward_origin: Option<Value>,
    pub forward_from: Option<User>,
    pub forward_from_chat: Option<Chat>,
    pub forward_sender_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl User {
    fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

impl Message {
    fn media(&self) -> Option<Media> {
        let (kind, file_id) = if let Some(largest) = self.photo.as_ref().and_then(|p| p.last()) {
            (NoteKind::Photo, &largest.file_id)
        } else if let Some(video) = &self.video {
            (NoteKind::Video, &video.file_id)
        } else if let Some(voice) = &self.voice {
            (NoteKind::Voice, &voice.file_id)
        } else if let Some(document) = &self.document {
            (NoteKind::File, &document.file_id)
        } else {
            return None;
        };
        Some(Media {
            kind,
            file_id: file_id.clone(),
            caption: self.caption.clone(),
        })
    }

    fn forwarded_from(&self) -> Option<String> {
        if let Some(chat) = &self.forward_from_chat {
            return chat.title.clone();
        }
        if let Some(user) = &self.forward_from {
            return Some(user.display_name());
        }
        if let Some(name) = &self.forward_sender_name {
            return Some(name.clone());
        }
        let origin = self.forward_origin.as_ref()?;
        origin
            .pointer("/chat/title")
            .or_else(|| origin.pointer("/sender_user/first_name"))
            .or_else(|| origin.get("sender_user_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn is_forwarded(&self) -> bool {
        self.forward_origin.is_some()
            || self.forward_from.is_some()
            || self.forward_from_chat.is_some()
            || self.forward_sender_name.is_some()
    }

    /// Convert to the dispatcher's inbound shape
    pub fn into_inbound(self) -> Inbound {
        let sender = self.from.as_ref().map_or_else(Sender::default, |u| Sender {
            username: u.username.clone().unwrap_or_default(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone().unwrap_or_default(),
        });
        Inbound {
            chat_id: self.chat.id,
            text: self.text.clone().unwrap_or_default(),
            media: self.media(),
            forwarded: self.is_forwarded(),
            forwarded_from: self.forwarded_from(),
            sender,
        }
    }
}

/// Reply keyboard markup for a keyboard descriptor
pub fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard.rows() {
        Some(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(|text| json!({ "text": text })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
        None => json!({ "remove_keyboard": true }),
    }
}

fn truncate_caption(caption: &str) -> String {
    let (head, _) = caption.split_at(utf16_prefix_len(caption, MAX_CAPTION_LEN));
    head.to_string()
}

/// Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    base_url: String,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            // Long polls hold the connection open for POLL_TIMEOUT_SECS
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS) + request_timeout)
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: API_BASE.to_string(),
            request_timeout,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        let text = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text)?;
        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                method,
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, TransportError> {
        let body = json!({
            "chat_id": chat,
            "text": text,
            "reply_markup": reply_markup(keyboard),
        });
        let sent: Message = self.call("sendMessage", &body, self.request_timeout).await?;
        Ok(sent.message_id)
    }

    /// Re-send stored media by file id
    pub async fn send_file(
        &self,
        chat: ChatId,
        kind: NoteKind,
        file_id: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, TransportError> {
        let (method, field) = match kind {
            NoteKind::Photo => ("sendPhoto", "photo"),
            NoteKind::Video => ("sendVideo", "video"),
            NoteKind::Voice => ("sendVoice", "voice"),
            NoteKind::File | NoteKind::Text | NoteKind::Link => ("sendDocument", "document"),
        };
        let body = json!({
            "chat_id": chat,
            field: file_id,
            "caption": truncate_caption(caption),
            "reply_markup": reply_markup(keyboard),
        });
        let sent: Message = self.call(method, &body, self.request_timeout).await?;
        Ok(sent.message_id)
    }

    pub async fn delete(&self, chat: ChatId, message: MessageRef) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat, "message_id": message });
        let _: bool = self.call("deleteMessage", &body, self.request_timeout).await?;
        Ok(())
    }

    /// Ask Telegram to push updates to `url` instead of answering polls
    pub async fn set_webhook(&self, url: &str) -> Result<(), TransportError> {
        let body = json!({ "url": url, "allowed_updates": ["message"] });
        let _: bool = self.call("setWebhook", &body, self.request_timeout).await?;
        tracing::info!(url, "Webhook registered");
        Ok(())
    }

    /// Remove any webhook so `getUpdates` works again
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TransportError> {
        let body = json!({ "drop_pending_updates": drop_pending_updates });
        let _: bool = self.call("deleteWebhook", &body, self.request_timeout).await?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });
        let timeout = Duration::from_secs(POLL_TIMEOUT_SECS) + self.request_timeout;
        self.call("getUpdates", &body, timeout).await
    }

    /// Long-poll for messages and forward them to the dispatcher until
    /// `cancel` fires or the receiver goes away. With `admin` set, messages
    /// from any other chat are dropped.
    pub async fn poll(
        &self,
        tx: mpsc::Sender<Inbound>,
        admin: Option<ChatId>,
        cancel: CancellationToken,
    ) {
        let mut offset: i64 = 0;
        tracing::info!(admin_only = admin.is_some(), "Telegram polling started");

        loop {
            let updates = tokio::select! {
                () = cancel.cancelled() => break,
                updates = self.get_updates(offset) => updates,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = update.update_id + 1;
                let Some(inbound) = update.accept(admin) else {
                    continue;
                };
                if tx.send(inbound).await.is_err() {
                    tracing::warn!("Dispatcher queue closed, stopping poll");
                    return;
                }
            }
        }

        tracing::info!("Telegram polling stopped");
    }
}
