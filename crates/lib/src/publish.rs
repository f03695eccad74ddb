//! Shared publish primitive: rate-limited, retrying dispatch to the destination.
//!
//! Both the relay engine and the submission workflow publish through here. A
//! publish takes one rate slot, then runs a bounded resolve-and-dispatch loop:
//! flood-wait signals are penalized and retried, everything else is terminal.

use crate::channels::{ApiError, ChannelApi, InboundMessage};
use crate::rate::RateLimiter;
use crate::resolver::ChannelResolver;
use std::sync::Arc;

/// Total attempts per publish, counting the first try. Keeps sustained
/// throttling from pinning a task in an endless penalize/retry cycle.
const MAX_DISPATCH_ATTEMPTS: u32 = 3;

/// What to publish.
#[derive(Debug)]
pub enum Outgoing<'a> {
    /// Forward preserving original authorship metadata.
    Forward(&'a InboundMessage),
    /// Re-send under the bot account; media and caption carry over.
    Copy(&'a InboundMessage),
    /// A freshly composed message.
    Post { text: &'a str },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// No write access to the destination; operator intervention needed.
    #[error("no write access to destination")]
    Forbidden,
    /// Still throttled after the retry budget was spent.
    #[error("rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Rate-limited dispatcher bound to one destination.
pub struct Publisher {
    api: Arc<dyn ChannelApi>,
    resolver: Arc<ChannelResolver>,
    limiter: RateLimiter,
    destination: String,
}

impl Publisher {
    pub fn new(
        api: Arc<dyn ChannelApi>,
        resolver: Arc<ChannelResolver>,
        limiter: RateLimiter,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            api,
            resolver,
            limiter,
            destination: destination.into(),
        }
    }

    /// Publish to the destination: acquire a rate slot, then dispatch with a
    /// bounded flood-wait retry loop. The destination is re-resolved on each
    /// attempt so a retry sees the current cache state.
    pub async fn publish(&self, outgoing: Outgoing<'_>) -> Result<(), PublishError> {
        self.limiter.acquire().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let dest = self.resolver.resolve(&self.destination).await?;
            let result = match &outgoing {
                Outgoing::Forward(msg) => {
                    self.api
                        .forward_message(&dest.chat_id, &msg.source, msg.message_id)
                        .await
                }
                Outgoing::Copy(msg) => {
                    self.api
                        .copy_message(&dest.chat_id, &msg.source, msg.message_id)
                        .await
                }
                Outgoing::Post { text } => self.api.send_message(&dest.chat_id, text).await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(ApiError::FloodWait(wait)) => {
                    if attempt >= MAX_DISPATCH_ATTEMPTS {
                        return Err(PublishError::RetriesExhausted { attempts: attempt });
                    }
                    self.limiter.penalize(wait).await;
                }
                Err(ApiError::Forbidden) => return Err(PublishError::Forbidden),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
