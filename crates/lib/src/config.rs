//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.courier/config.json`) and environment.
//! Covers the Telegram connection, relay sources/destination, rate limiting,
//! content filters, and the status server.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Relay sources, destination, and dispatch mode.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Rate limiting to avoid provider flood bans.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Content filter rules for the relay and submission screening.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Status server bind and port.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Telegram connection config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL override (tests, self-hosted gateways). Overridden by TELEGRAM_API_BASE env.
    pub api_base: Option<String>,
}

/// Relay config: which feeds to monitor and where to publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Source feeds: handles (@channel), numeric ids (-100...), or t.me links.
    #[serde(default)]
    pub source_channels: Vec<String>,

    /// Destination feed: handle, numeric id, or link.
    pub destination_channel: Option<String>,

    /// When true, forward (preserves original authorship); when false, copy
    /// (re-sends under the bot account).
    #[serde(default)]
    pub forward_mode: bool,
}

/// Rate limiting config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Fixed delay between dispatches, in seconds.
    #[serde(default = "default_message_delay")]
    pub message_delay: f64,

    /// Multiplier applied to server-requested flood waits.
    #[serde(default = "default_flood_wait_multiplier")]
    pub flood_wait_multiplier: f64,

    /// Maximum dispatches per rolling 60-second window.
    #[serde(default = "default_max_messages_per_minute")]
    pub max_messages_per_minute: usize,
}

fn default_message_delay() -> f64 {
    1.0
}

fn default_flood_wait_multiplier() -> f64 {
    1.5
}

fn default_max_messages_per_minute() -> usize {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            message_delay: default_message_delay(),
            flood_wait_multiplier: default_flood_wait_multiplier(),
            max_messages_per_minute: default_max_messages_per_minute(),
        }
    }
}

/// Content filter config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Keywords to include (message must contain at least one, case-insensitive).
    #[serde(default)]
    pub include_keywords: Vec<String>,

    /// Keywords to exclude (message must not contain any).
    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    /// Whether to relay messages without text (media only).
    #[serde(default = "default_include_media_only")]
    pub include_media_only: bool,

    /// Minimum message length in characters (0 = no limit for the relay;
    /// the submission screener falls back to its own default).
    #[serde(default)]
    pub min_message_length: usize,
}

fn default_include_media_only() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            include_media_only: default_include_media_only(),
            min_message_length: 0,
        }
    }
}

/// Status server bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusConfig {
    /// Port for the HTTP status endpoint (default 8787).
    #[serde(default = "default_status_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_status_bind")]
    pub bind: String,
}

fn default_status_port() -> u16 {
    8787
}

fn default_status_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            port: default_status_port(),
            bind: default_status_bind(),
        }
    }
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .telegram
                .bot_token
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("COURIER_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".courier").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or COURIER_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Check the relay section is usable: at least one source and a destination.
pub fn validate_relay(config: &Config) -> Result<()> {
    anyhow::ensure!(
        !config.relay.source_channels.is_empty(),
        "at least one relay.sourceChannels entry must be configured"
    );
    anyhow::ensure!(
        config
            .relay
            .destination_channel
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty()),
        "relay.destinationChannel must be configured"
    );
    Ok(())
}
