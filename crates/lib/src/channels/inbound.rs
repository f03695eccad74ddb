//! Inbound events from a channel: decoded once at the network boundary,
//! then delivered to the relay engine or the submission workflow.

use chrono::{DateTime, Utc};

/// A message received from a monitored feed or a private bot chat.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Chat id of the feed the message arrived from (canonical numeric id as a string).
    pub source: String,
    /// Message id, unique within the source chat.
    pub message_id: i64,
    /// Sender user id when the message came from a user (private bot chats); None for channel posts.
    pub sender_id: Option<i64>,
    /// Text or caption; empty when the message carries only media.
    pub text: String,
    /// True when the message has attached media (photo, document, video, audio, voice).
    pub has_media: bool,
    pub received_at: DateTime<Utc>,
}

/// Interactive action selected by a submitter on a pending-submission preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    Confirm,
    Cancel,
    Edit,
}

impl SubmitAction {
    /// Opaque callback token carried in the inline keyboard button.
    pub fn token(self) -> &'static str {
        match self {
            SubmitAction::Confirm => "confirm_post",
            SubmitAction::Cancel => "cancel_post",
            SubmitAction::Edit => "edit_post",
        }
    }

    /// Decode a callback token; unknown tokens are dropped at the boundary.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "confirm_post" => Some(SubmitAction::Confirm),
            "cancel_post" => Some(SubmitAction::Cancel),
            "edit_post" => Some(SubmitAction::Edit),
            _ => None,
        }
    }
}

/// A button press on a submission preview.
#[derive(Debug, Clone)]
pub struct ActionEvent {
    pub submitter_id: i64,
    /// Chat the preview message lives in (the submitter's private chat).
    pub chat_id: String,
    /// Message id of the preview message, for editing the outcome in place.
    pub message_id: i64,
    /// Callback query id, acknowledged after handling.
    pub callback_id: String,
    pub action: SubmitAction,
}

/// Everything the network can deliver to the core.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message(InboundMessage),
    Action(ActionEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tokens_round_trip() {
        for action in [SubmitAction::Confirm, SubmitAction::Cancel, SubmitAction::Edit] {
            assert_eq!(SubmitAction::from_token(action.token()), Some(action));
        }
    }

    #[test]
    fn unknown_token_is_dropped() {
        assert_eq!(SubmitAction::from_token("subscribe"), None);
    }
}
