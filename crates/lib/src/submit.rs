//! Submission workflow: screen user submissions, preview them, and publish on
//! confirmation.
//!
//! State is per submitter: at most one pending submission at a time. A new
//! message while a confirmation is outstanding replaces the pending entry and
//! is re-screened (the fresh preview prompt makes the replacement visible).

use crate::channels::{
    resolve_api_base, ActionEvent, ChannelApi, ChannelEvent, InboundMessage, SubmitAction,
    TelegramApi,
};
use crate::config::{self, Config};
use crate::publish::{Outgoing, Publisher};
use crate::rate::RateLimiter;
use crate::resolver::ChannelResolver;
use crate::screen::Screener;
use crate::stats::SubmissionStats;
use crate::status;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Preview length shown to the submitter before confirmation.
const PREVIEW_LIMIT: usize = 500;

const WELCOME_TEXT: &str = "Welcome to the listing submission bot.\n\n\
How it works:\n\
1. Send me your listing message\n\
2. I check it against the posting guidelines\n\
3. You confirm, and it is posted to the channel\n\n\
Your message should include the property type, location, price and terms, \
and contact information. Send your listing now.";

const HELP_TEXT: &str = "Posting guidelines.\n\n\
Do include: property type (apartment, flat, room, studio), location, \
monthly rent, availability date, and contact details.\n\
Don't include: promotional content, suspicious links, or off-topic messages.\n\n\
Send your listing message to get started.";

/// A submission waiting for its submitter's confirmation.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Per-submitter screen / preview / confirm state machine.
pub struct SubmissionWorkflow {
    api: Arc<dyn ChannelApi>,
    publisher: Publisher,
    screener: Screener,
    pending: Mutex<HashMap<i64, PendingSubmission>>,
    stats: Arc<SubmissionStats>,
}

impl SubmissionWorkflow {
    pub fn new(
        api: Arc<dyn ChannelApi>,
        publisher: Publisher,
        screener: Screener,
        stats: Arc<SubmissionStats>,
    ) -> Self {
        Self {
            api,
            publisher,
            screener,
            pending: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Handle a message in the submitter's private chat: commands, or a new
    /// submission to screen. Replies are best-effort; send failures are logged.
    pub async fn handle_message(&self, message: &InboundMessage) {
        let Some(submitter_id) = message.sender_id else {
            return;
        };
        let chat_id = &message.source;

        if let Some(command) = message.text.strip_prefix('/') {
            self.handle_command(command, chat_id).await;
            return;
        }

        self.stats.record_received();
        log::info!(
            "submission from {}: {:.50}",
            submitter_id,
            message.text.replace('\n', " ")
        );

        let decision = self.screener.screen(&message.text);
        if !decision.accepted {
            self.stats.record_rejected();
            log::debug!(
                "submission from {} rejected: {}",
                submitter_id,
                decision.reason.as_str()
            );
            self.reply(chat_id, &decision.message).await;
            return;
        }

        // Overwrites any earlier pending entry for this submitter.
        self.pending.lock().await.insert(
            submitter_id,
            PendingSubmission {
                text: message.text.clone(),
                created_at: Utc::now(),
            },
        );

        let preview = preview_text(&message.text);
        let prompt = format!(
            "Preview of your listing:\n\n{}\n\nPost this to the channel?",
            preview
        );
        let buttons = vec![
            ("Post to channel".to_string(), SubmitAction::Confirm.token().to_string()),
            ("Cancel".to_string(), SubmitAction::Cancel.token().to_string()),
            ("Edit".to_string(), SubmitAction::Edit.token().to_string()),
        ];
        if let Err(e) = self.api.send_keyboard(chat_id, &prompt, &buttons).await {
            log::error!("failed to send preview to {}: {}", submitter_id, e);
        }
    }

    /// Handle a confirm/cancel/edit button press on a preview message.
    pub async fn handle_action(&self, action: &ActionEvent) {
        match action.action {
            SubmitAction::Confirm => self.confirm(action).await,
            SubmitAction::Cancel => {
                self.pending.lock().await.remove(&action.submitter_id);
                self.edit_preview(action, "Submission cancelled. Send a new message anytime.")
                    .await;
                self.acknowledge(action, None).await;
            }
            SubmitAction::Edit => {
                self.pending.lock().await.remove(&action.submitter_id);
                self.edit_preview(action, "Please send your edited listing message.")
                    .await;
                self.acknowledge(action, None).await;
            }
        }
    }

    async fn confirm(&self, action: &ActionEvent) {
        let Some(submission) = self.pending.lock().await.remove(&action.submitter_id) else {
            // Stale button, e.g. after a restart. No side effects.
            self.acknowledge(
                action,
                Some("No pending submission found. Please send a new message."),
            )
            .await;
            return;
        };

        let post = format!(
            "New listing\n\n{}\n\nSubmitted via the posting bot",
            submission.text
        );
        match self.publisher.publish(Outgoing::Post { text: &post }).await {
            Ok(()) => {
                self.stats.record_approved();
                log::info!("posted submission from {}", action.submitter_id);
                self.edit_preview(action, "Your listing has been posted to the channel. Thank you!")
                    .await;
            }
            Err(e) => {
                self.stats.record_error();
                log::error!(
                    "failed to post submission from {}: {}",
                    action.submitter_id,
                    e
                );
                self.edit_preview(
                    action,
                    "Failed to post to the channel. Please try again later or contact an admin.",
                )
                .await;
            }
        }
        self.acknowledge(action, None).await;
    }

    async fn handle_command(&self, command: &str, chat_id: &str) {
        match command.split_whitespace().next().unwrap_or("") {
            "start" => self.reply(chat_id, WELCOME_TEXT).await,
            "help" => self.reply(chat_id, HELP_TEXT).await,
            "status" => {
                let snap = self.stats.snapshot();
                let text = format!(
                    "Bot statistics\n\nTotal submissions: {}\nApproved: {}\nRejected: {}",
                    snap.received, snap.approved, snap.rejected
                );
                self.reply(chat_id, &text).await;
            }
            other => {
                log::debug!("ignoring unknown command /{}", other);
            }
        }
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.api.send_message(chat_id, text).await {
            log::error!("failed to reply in chat {}: {}", chat_id, e);
        }
    }

    async fn edit_preview(&self, action: &ActionEvent, text: &str) {
        if let Err(e) = self
            .api
            .edit_message(&action.chat_id, action.message_id, text)
            .await
        {
            log::debug!("failed to edit preview message: {}", e);
        }
    }

    async fn acknowledge(&self, action: &ActionEvent, notice: Option<&str>) {
        if let Err(e) = self.api.answer_callback(&action.callback_id, notice).await {
            log::debug!("failed to answer callback: {}", e);
        }
    }

    #[cfg(test)]
    async fn pending_text(&self, submitter_id: i64) -> Option<String> {
        self.pending
            .lock()
            .await
            .get(&submitter_id)
            .map(|p| p.text.clone())
    }
}

/// First 500 characters of the submission, with an ellipsis when truncated.
fn preview_text(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_LIMIT).collect();
    if text.chars().count() > PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview
}

/// Run the submission bot until ctrl-c: screen private-chat messages, publish
/// confirmed submissions to the destination channel.
pub async fn run_submission_bot(config: Config) -> Result<()> {
    anyhow::ensure!(
        config
            .relay
            .destination_channel
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty()),
        "relay.destinationChannel must be configured"
    );
    let token = config::resolve_telegram_token(&config)
        .context("telegram bot token not configured (set telegram.botToken or TELEGRAM_BOT_TOKEN)")?;
    let api = Arc::new(TelegramApi::new(
        token,
        resolve_api_base(config.telegram.api_base.as_deref()),
    ));
    let resolver = Arc::new(ChannelResolver::new(api.clone()));

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

    let stats = Arc::new(SubmissionStats::default());
    let limiter = RateLimiter::new(&config.rate_limit);
    let publisher = Publisher::new(api.clone(), resolver, limiter, destination);
    let workflow = Arc::new(SubmissionWorkflow::new(
        api.clone(),
        publisher,
        Screener::new(&config.filters),
        stats.clone(),
    ));

    status::spawn_status_server(config.status.clone(), "submissions", stats.clone());

    let (inbound_tx, mut inbound_rx) = mpsc::channel(64);
    let poll_handle = api.clone().start_inbound(inbound_tx);
    log::info!("submission bot running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupt received, shutting down");
                break;
            }
            event = inbound_rx.recv() => match event {
                Some(ChannelEvent::Message(message)) => {
                    let workflow = workflow.clone();
                    tokio::spawn(async move {
                        workflow.handle_message(&message).await;
                    });
                }
                Some(ChannelEvent::Action(action)) => {
                    let workflow = workflow.clone();
                    tokio::spawn(async move {
                        workflow.handle_action(&action).await;
                    });
                }
                None => break,
            }
        }
    }

    api.stop();
    poll_handle.abort();
    let snap = stats.snapshot();
    log::info!(
        "session stats - received: {}, approved: {}, rejected: {}, errors: {}",
        snap.received,
        snap.approved,
        snap.rejected,
        snap.errors
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ApiError, ChatInfo};
    use crate::config::{FilterConfig, RateLimitConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every outbound call so tests can assert on the conversation.
    #[derive(Default)]
    struct RecordingApi {
        sent: Mutex<Vec<(String, String)>>,
        keyboards: Mutex<Vec<(String, String)>>,
        edits: Mutex<Vec<(String, String)>>,
        answers: Mutex<Vec<Option<String>>>,
        posts: AtomicUsize,
        fail_posts: bool,
    }

    #[async_trait]
    impl ChannelApi for RecordingApi {
        async fn get_chat(&self, _: &str) -> Result<ChatInfo, ApiError> {
            Ok(ChatInfo {
                id: -100500,
                title: Some("Listings".to_string()),
            })
        }

        async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ApiError> {
            if chat_id == "-100500" {
                if self.fail_posts {
                    return Err(ApiError::Forbidden);
                }
                self.posts.fetch_add(1, Ordering::SeqCst);
            }
            self.sent
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn send_keyboard(
            &self,
            chat_id: &str,
            text: &str,
            _: &[(String, String)],
        ) -> Result<(), ApiError> {
            self.keyboards
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn copy_message(&self, _: &str, _: &str, _: i64) -> Result<(), ApiError> {
            Ok(())
        }

        async fn forward_message(&self, _: &str, _: &str, _: i64) -> Result<(), ApiError> {
            Ok(())
        }

        async fn edit_message(&self, chat_id: &str, _: i64, text: &str) -> Result<(), ApiError> {
            self.edits
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn answer_callback(&self, _: &str, text: Option<&str>) -> Result<(), ApiError> {
            self.answers.lock().await.push(text.map(|t| t.to_string()));
            Ok(())
        }
    }

    fn workflow(api: Arc<RecordingApi>) -> (SubmissionWorkflow, Arc<SubmissionStats>) {
        let stats = Arc::new(SubmissionStats::default());
        let limiter = RateLimiter::new(&RateLimitConfig {
            message_delay: 0.0,
            flood_wait_multiplier: 1.0,
            max_messages_per_minute: 100,
        });
        let resolver = Arc::new(ChannelResolver::new(api.clone()));
        let publisher = Publisher::new(api.clone(), resolver, limiter, "@listings");
        (
            SubmissionWorkflow::new(
                api,
                publisher,
                Screener::new(&FilterConfig::default()),
                stats.clone(),
            ),
            stats,
        )
    }

    fn submission(text: &str) -> InboundMessage {
        InboundMessage {
            source: "42".to_string(),
            message_id: 5,
            sender_id: Some(42),
            text: text.to_string(),
            has_media: false,
            received_at: Utc::now(),
        }
    }

    fn action(kind: SubmitAction) -> ActionEvent {
        ActionEvent {
            submitter_id: 42,
            chat_id: "42".to_string(),
            message_id: 6,
            callback_id: "cb1".to_string(),
            action: kind,
        }
    }

    const LISTING: &str = "nice flat for rent, 2 bedrooms, $900/mo, available now, contact me";

    #[tokio::test]
    async fn accepted_submission_is_held_for_confirmation() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        assert_eq!(workflow.pending_text(42).await.as_deref(), Some(LISTING));
        // Preview prompt was sent, nothing was published yet.
        assert_eq!(api.keyboards.lock().await.len(), 1);
        assert_eq!(api.posts.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().received, 1);
        assert_eq!(stats.snapshot().approved, 0);
    }

    #[tokio::test]
    async fn rejected_submission_gets_feedback_and_no_pending_entry() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_message(&submission("too short")).await;
        assert!(workflow.pending_text(42).await.is_none());
        assert_eq!(stats.snapshot().rejected, 1);
        let sent = api.sent.lock().await;
        assert!(sent[0].1.contains("too short"));
    }

    #[tokio::test]
    async fn confirm_publishes_and_reports() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        workflow.handle_action(&action(SubmitAction::Confirm)).await;
        assert_eq!(api.posts.load(Ordering::SeqCst), 1);
        assert_eq!(stats.snapshot().approved, 1);
        assert!(workflow.pending_text(42).await.is_none());
        let edits = api.edits.lock().await;
        assert!(edits[0].1.contains("posted to the channel"));
    }

    #[tokio::test]
    async fn confirm_without_pending_is_a_noop_with_notice() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_action(&action(SubmitAction::Confirm)).await;
        assert_eq!(api.posts.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().approved, 0);
        let answers = api.answers.lock().await;
        assert!(answers[0]
            .as_deref()
            .is_some_and(|t| t.contains("No pending submission")));
    }

    #[tokio::test]
    async fn failed_publish_counts_an_error_and_tells_the_submitter() {
        let api = Arc::new(RecordingApi {
            fail_posts: true,
            ..RecordingApi::default()
        });
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        workflow.handle_action(&action(SubmitAction::Confirm)).await;
        let snap = stats.snapshot();
        assert_eq!(snap.approved, 0);
        assert_eq!(snap.errors, 1);
        let edits = api.edits.lock().await;
        assert!(edits[0].1.contains("Failed to post"));
    }

    #[tokio::test]
    async fn cancel_discards_pending_without_publishing() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, stats) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        workflow.handle_action(&action(SubmitAction::Cancel)).await;
        assert!(workflow.pending_text(42).await.is_none());
        assert_eq!(api.posts.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().approved, 0);
    }

    #[tokio::test]
    async fn new_message_replaces_pending_entry() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, _) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        let replacement = "studio apartment for rent downtown, $700 monthly, pets welcome";
        workflow.handle_message(&submission(replacement)).await;
        assert_eq!(workflow.pending_text(42).await.as_deref(), Some(replacement));
        assert_eq!(api.keyboards.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn status_command_reports_counters() {
        let api = Arc::new(RecordingApi::default());
        let (workflow, _) = workflow(api.clone());
        workflow.handle_message(&submission(LISTING)).await;
        workflow.handle_message(&submission("/status")).await;
        let sent = api.sent.lock().await;
        let status = &sent[sent.len() - 1].1;
        assert!(status.contains("Total submissions: 1"));
    }

    #[test]
    fn preview_is_truncated_with_ellipsis() {
        let long = "x".repeat(600);
        let preview = preview_text(&long);
        assert_eq!(preview.chars().count(), 503);
        assert!(preview.ends_with("..."));
        assert_eq!(preview_text("short"), "short");
    }
}
