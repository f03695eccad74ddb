//! Relay content filter: pure rules over message text and media.

use crate::channels::InboundMessage;
use crate::config::FilterConfig;

/// Decide whether a relayed message passes the configured filter rules.
///
/// Checks run in order and short-circuit: media-only gate, minimum length,
/// required keywords (any match), excluded keywords (no match). A message with
/// neither text nor media never passes.
pub fn should_forward(message: &InboundMessage, rules: &FilterConfig) -> bool {
    if message.text.is_empty() {
        return message.has_media && rules.include_media_only;
    }

    if message.text.chars().count() < rules.min_message_length {
        log::debug!(
            "message {} too short: {} < {}",
            message.message_id,
            message.text.chars().count(),
            rules.min_message_length
        );
        return false;
    }

    let text_lower = message.text.to_lowercase();

    if !rules.include_keywords.is_empty()
        && !rules
            .include_keywords
            .iter()
            .any(|kw| text_lower.contains(&kw.to_lowercase()))
    {
        log::debug!("message {} lacks required keywords", message.message_id);
        return false;
    }

    if rules
        .exclude_keywords
        .iter()
        .any(|kw| text_lower.contains(&kw.to_lowercase()))
    {
        log::debug!("message {} contains excluded keywords", message.message_id);
        return false;
    }

    true
}
