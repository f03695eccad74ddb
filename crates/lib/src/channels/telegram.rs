//! Telegram channel: long-poll getUpdates for inbound events, Bot API calls for dispatch.

use crate::channels::api::{ApiError, ChannelApi, ChatInfo};
use crate::channels::inbound::{ActionEvent, ChannelEvent, InboundMessage, SubmitAction};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;

/// Bot API response envelope. Failed calls carry error_code/description and,
/// for rate-limit errors, parameters.retry_after.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<serde_json::Value>,
    #[serde(default)]
    pub document: Option<serde_json::Value>,
    #[serde(default)]
    pub video: Option<serde_json::Value>,
    #[serde(default)]
    pub audio: Option<serde_json::Value>,
    #[serde(default)]
    pub voice: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Telegram connector: long-polls for updates and dispatches via the Bot API.
pub struct TelegramApi {
    token: String,
    base_url: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramApi {
    pub fn new(token: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        Self {
            token: token.into(),
            base_url,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the long-poll loop after the in-flight poll returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the getUpdates long-poll loop and feed decoded events into the channel.
    /// Returns a handle to await on shutdown.
    pub fn start_inbound(self: Arc<Self>, inbound_tx: mpsc::Sender<ChannelEvent>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call Telegram getUpdates (long poll). Returns (decoded events, next offset).
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<ChannelEvent>, Option<i64>), ApiError> {
        let url = format!(
            "{}/bot{}/getUpdates?timeout={}",
            self.base_url, self.token, LONG_POLL_TIMEOUT
        );
        let url = if let Some(off) = offset {
            format!("{}&offset={}", url, off)
        } else {
            url
        };
        let res = self.client.get(&url).send().await?;
        let updates: Vec<TelegramUpdate> = parse_response(res).await?;
        let next_offset = updates
            .iter()
            .map(|u| u.update_id)
            .max()
            .map(|id| id + 1);
        let events = updates.into_iter().filter_map(decode_update).collect();
        Ok((events, next_offset))
    }

    /// POST a Bot API method with a JSON body and decode the result.
    async fn invoke<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let res = self.client.post(&url).json(&body).send().await?;
        parse_response(res).await
    }
}

/// Decode the envelope, mapping provider signals onto the error taxonomy:
/// 429 becomes FloodWait with the suggested wait, 403 becomes Forbidden.
async fn parse_response<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
    let status = res.status();
    let body = res.text().await?;
    let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
        .map_err(|_| ApiError::Api(format!("{} {}", status, body)))?;
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| ApiError::Api("response missing result".to_string()));
    }
    match envelope.error_code {
        Some(429) => {
            let wait = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            Err(ApiError::FloodWait(wait))
        }
        Some(403) => Err(ApiError::Forbidden),
        code => Err(ApiError::Api(format!(
            "{} {}",
            code.unwrap_or_else(|| status.as_u16() as i64),
            envelope.description.unwrap_or_default()
        ))),
    }
}

/// Decode one update into a core event. Updates with no text/caption/media payload
/// and callback queries with unknown tokens are dropped here.
fn decode_update(update: TelegramUpdate) -> Option<ChannelEvent> {
    if let Some(cb) = update.callback_query {
        let action = cb.data.as_deref().and_then(SubmitAction::from_token)?;
        let preview = cb.message?;
        return Some(ChannelEvent::Action(ActionEvent {
            submitter_id: cb.from.id,
            chat_id: preview.chat.id.to_string(),
            message_id: preview.message_id,
            callback_id: cb.id,
            action,
        }));
    }
    let msg = update.message.or(update.channel_post)?;
    let has_media = msg.photo.is_some()
        || msg.document.is_some()
        || msg.video.is_some()
        || msg.audio.is_some()
        || msg.voice.is_some();
    let text = msg.text.or(msg.caption).unwrap_or_default();
    if text.is_empty() && !has_media {
        return None;
    }
    Some(ChannelEvent::Message(InboundMessage {
        source: msg.chat.id.to_string(),
        message_id: msg.message_id,
        sender_id: msg.from.map(|u| u.id),
        text,
        has_media,
        received_at: Utc::now(),
    }))
}

async fn run_get_updates_loop(api: Arc<TelegramApi>, inbound_tx: mpsc::Sender<ChannelEvent>) {
    let mut offset: Option<i64> = None;
    while api.running() {
        match api.get_updates(offset).await {
            Ok((events, next)) => {
                offset = next;
                for event in events {
                    if inbound_tx.send(event).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::debug!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram: getUpdates loop stopped");
}

#[async_trait]
impl ChannelApi for TelegramApi {
    async fn get_chat(&self, identifier: &str) -> Result<ChatInfo, ApiError> {
        let chat: TelegramChat = self
            .invoke("getChat", serde_json::json!({ "chat_id": identifier }))
            .await?;
        Ok(ChatInfo {
            id: chat.id,
            title: chat.title,
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .invoke(
                "sendMessage",
                serde_json::json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[(String, String)],
    ) -> Result<(), ApiError> {
        let rows: Vec<serde_json::Value> = buttons
            .iter()
            .map(|(label, token)| {
                serde_json::json!([{ "text": label, "callback_data": token }])
            })
            .collect();
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": { "inline_keyboard": rows }
        });
        let _: serde_json::Value = self.invoke("sendMessage", body).await?;
        Ok(())
    }

    async fn copy_message(&self, to: &str, from: &str, message_id: i64) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "chat_id": to,
            "from_chat_id": from,
            "message_id": message_id
        });
        let _: serde_json::Value = self.invoke("copyMessage", body).await?;
        Ok(())
    }

    async fn forward_message(&self, to: &str, from: &str, message_id: i64)
        -> Result<(), ApiError> {
        let body = serde_json::json!({
            "chat_id": to,
            "from_chat_id": from,
            "message_id": message_id
        });
        let _: serde_json::Value = self.invoke("forwardMessage", body).await?;
        Ok(())
    }

    async fn edit_message(&self, chat_id: &str, message_id: i64, text: &str)
        -> Result<(), ApiError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text
        });
        let _: serde_json::Value = self.invoke("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), ApiError> {
        let mut body = serde_json::json!({ "callback_query_id": callback_id });
        if let Some(t) = text {
            body["text"] = serde_json::Value::String(t.to_string());
        }
        let _: serde_json::Value = self.invoke("answerCallbackQuery", body).await?;
        Ok(())
    }
}

/// Resolve the Bot API base URL: TELEGRAM_API_BASE env overrides the configured value.
pub fn resolve_api_base(configured: Option<&str>) -> Option<String> {
    std::env::var("TELEGRAM_API_BASE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}
