//! Channel-handle resolution with a process-lifetime cache.
//!
//! Configured identifiers (handles, numeric ids, t.me links) are resolved via
//! the network once and cached by the original identifier string. The cache is
//! append-only and never invalidated; a renamed or deleted channel requires a
//! restart to pick up.

use crate::channels::{ApiError, ChannelApi};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const LINK_PREFIX: &str = "https://t.me/";

/// A resolved channel: the configured identifier, the canonical chat id, and
/// when the resolution happened.
#[derive(Debug, Clone)]
pub struct ChannelRef {
    pub identifier: String,
    pub chat_id: String,
    pub title: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Resolves and caches channel references.
pub struct ChannelResolver {
    api: Arc<dyn ChannelApi>,
    cache: RwLock<HashMap<String, ChannelRef>>,
}

impl ChannelResolver {
    pub fn new(api: Arc<dyn ChannelApi>) -> Self {
        Self {
            api,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a configured identifier to a channel reference.
    ///
    /// Repeated calls with the same identifier hit the cache. Concurrent calls
    /// for the same uncached identifier each perform the lookup and store the
    /// identical result.
    pub async fn resolve(&self, identifier: &str) -> Result<ChannelRef, ApiError> {
        if let Some(cached) = self.cache.read().await.get(identifier) {
            return Ok(cached.clone());
        }

        let lookup = normalize(identifier);
        let info = self.api.get_chat(&lookup).await?;
        let resolved = ChannelRef {
            identifier: identifier.to_string(),
            chat_id: info.id.to_string(),
            title: info.title,
            resolved_at: Utc::now(),
        };
        log::info!(
            "resolved channel {} -> {} ({})",
            identifier,
            resolved.chat_id,
            resolved.title.as_deref().unwrap_or("untitled")
        );
        self.cache
            .write()
            .await
            .insert(identifier.to_string(), resolved.clone());
        Ok(resolved)
    }
}

/// Turn a configured identifier into the lookup form the network expects:
/// strip a t.me link prefix, keep numeric ids and invite codes as-is, and
/// prefix bare usernames with '@'.
fn normalize(identifier: &str) -> String {
    let id = identifier.trim();
    let id = id.strip_prefix(LINK_PREFIX).unwrap_or(id);
    if id.starts_with('@') || id.starts_with('+') || id.starts_with('-') {
        return id.to_string();
    }
    if id.chars().all(|c| c.is_ascii_digit()) {
        return id.to_string();
    }
    format!("@{}", id)
}
