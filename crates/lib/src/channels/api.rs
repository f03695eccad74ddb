//! Outbound channel surface: the trait the resolver and publisher dispatch through,
//! and the error taxonomy for provider signals.

use async_trait::async_trait;

/// Errors raised by the chat network.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Provider backoff signal; carries the suggested wait in seconds.
    #[error("rate limited by server, retry after {0}s")]
    FloodWait(u64),
    /// No write access to the target chat.
    #[error("no write access to chat")]
    Forbidden,
    #[error("api error: {0}")]
    Api(String),
}

/// A resolved chat, as reported by the network.
#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: i64,
    pub title: Option<String>,
}

/// Outbound operations against the chat network. Implemented by the Telegram
/// connector; mocked in tests.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Look up a chat by handle, numeric id, or normalized link.
    async fn get_chat(&self, identifier: &str) -> Result<ChatInfo, ApiError>;

    /// Send a plain text message to a chat.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ApiError>;

    /// Send a text message with one inline action button per row (label, callback token).
    async fn send_keyboard(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[(String, String)],
    ) -> Result<(), ApiError>;

    /// Re-send a message under the bot account; the provider carries media and caption over.
    async fn copy_message(&self, to: &str, from: &str, message_id: i64) -> Result<(), ApiError>;

    /// Forward a message preserving original authorship metadata.
    async fn forward_message(&self, to: &str, from: &str, message_id: i64)
        -> Result<(), ApiError>;

    /// Replace the text of a previously sent message.
    async fn edit_message(&self, chat_id: &str, message_id: i64, text: &str)
        -> Result<(), ApiError>;

    /// Acknowledge a callback query, optionally with a short notice shown to the user.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), ApiError>;
}
