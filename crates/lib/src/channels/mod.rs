//! Communication channel (Telegram).
//!
//! Inbound events are decoded at the boundary into a closed event type and fed
//! to the relay engine or submission workflow; outbound dispatch goes through
//! the `ChannelApi` trait so the core can be tested against a mock network.

mod api;
mod inbound;
mod telegram;

pub use api::{ApiError, ChannelApi, ChatInfo};
pub use inbound::{ActionEvent, ChannelEvent, InboundMessage, SubmitAction};
pub use telegram::{resolve_api_base, TelegramApi, TelegramUpdate};
