//! Relay pipeline: filter inbound feed messages and publish them to the destination.

use crate::channels::{resolve_api_base, ChannelEvent, InboundMessage, TelegramApi};
use crate::config::{self, Config, FilterConfig};
use crate::filter;
use crate::publish::{Outgoing, Publisher};
use crate::rate::RateLimiter;
use crate::resolver::ChannelResolver;
use crate::stats::RelayStats;
use crate::status;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Applies filter rules to inbound messages and publishes survivors.
pub struct ForwardingEngine {
    publisher: Publisher,
    rules: FilterConfig,
    forward_mode: bool,
    stats: Arc<RelayStats>,
}

impl ForwardingEngine {
    pub fn new(
        publisher: Publisher,
        rules: FilterConfig,
        forward_mode: bool,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            publisher,
            rules,
            forward_mode,
            stats,
        }
    }

    /// Handle one inbound message: count it, filter it, publish it. Dispatch
    /// failures are absorbed here as error counts; nothing propagates.
    pub async fn handle_message(&self, message: &InboundMessage) {
        self.stats.record_received();

        if !filter::should_forward(message, &self.rules) {
            self.stats.record_filtered();
            log::debug!("message {} filtered out", message.message_id);
            return;
        }

        let outgoing = if self.forward_mode {
            Outgoing::Forward(message)
        } else {
            Outgoing::Copy(message)
        };
        match self.publisher.publish(outgoing).await {
            Ok(()) => {
                self.stats.record_forwarded();
                log::info!(
                    "{} message {} from {}",
                    if self.forward_mode { "forwarded" } else { "copied" },
                    message.message_id,
                    message.source
                );
            }
            Err(e) => {
                self.stats.record_error();
                log::error!("failed to publish message {}: {}", message.message_id, e);
            }
        }
    }
}

/// Run the relay until ctrl-c: resolve sources and destination, start the
/// long-poll loop, and handle each inbound message in its own task.
pub async fn run_relay(config: Config) -> Result<()> {
    config::validate_relay(&config)?;
    let token = config::resolve_telegram_token(&config)
        .context("telegram bot token not configured (set telegram.botToken or TELEGRAM_BOT_TOKEN)")?;
    let api = Arc::new(TelegramApi::new(
        token,
        resolve_api_base(config.telegram.api_base.as_deref()),
    ));
    let resolver = Arc::new(ChannelResolver::new(api.clone()));

    // Resolve every configured source up front; a relay with no valid source
    // has nothing to do.
    let mut sources: HashSet<String> = HashSet::new();
    for identifier in &config.relay.source_channels {
        match resolver.resolve(identifier).await {
            Ok(channel) => {
                sources.insert(channel.chat_id);
            }
            Err(e) => log::error!("failed to resolve source {}: {}", identifier, e),
        }
    }
    anyhow::ensure!(!sources.is_empty(), "no valid source channels found");

    let destination = config
        .relay
        .destination_channel
        .clone()
        .unwrap_or_default();
    let dest = resolver
        .resolve(&destination)
        .await
        .with_context(|| format!("resolving destination channel {}", destination))?;
    log::info!(
        "destination channel verified: {}",
        dest.title.as_deref().unwrap_or(&dest.chat_id)
    );

    let stats = Arc::new(RelayStats::default());
    let limiter = RateLimiter::new(&config.rate_limit);
    let publisher = Publisher::new(api.clone(), resolver, limiter, destination);
    let engine = Arc::new(ForwardingEngine::new(
        publisher,
        config.filters.clone(),
        config.relay.forward_mode,
        stats.clone(),
    ));

    status::spawn_status_server(config.status.clone(), "relay", stats.clone());

    let (inbound_tx, mut inbound_rx) = mpsc::channel(64);
    let poll_handle = api.clone().start_inbound(inbound_tx);
    log::info!(
        "relay running: {} source(s), mode {}",
        sources.len(),
        if config.relay.forward_mode { "forward" } else { "copy" }
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupt received, shutting down");
                break;
            }
            event = inbound_rx.recv() => match event {
                Some(ChannelEvent::Message(message)) if sources.contains(&message.source) => {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        engine.handle_message(&message).await;
                    });
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    api.stop();
    poll_handle.abort();
    let snap = stats.snapshot();
    log::info!(
        "session stats - received: {}, forwarded: {}, filtered: {}, errors: {}",
        snap.received,
        snap.forwarded,
        snap.filtered,
        snap.errors
    );
    Ok(())
}
