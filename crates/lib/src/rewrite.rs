//! Rewrite pipeline: filter, lock the channel, match a rule, repost, record, delete.
//!
//! Each inbound message is handled in its own task. Messages in the same channel are
//! processed one at a time; different channels run concurrently.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::channels::{FileUpload, InboundMessage, MessageId, OutboundMessage, Platform, PlatformError};
use crate::dedup::DedupGuard;
use crate::rules::{RewriteResult, RuleRegistry};
use crate::serializer::ChannelSerializer;

/// Maximum message length the platform accepts.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

const TRUNCATION_MARKER: &str = "...";

/// Why a message was ignored before reaching the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    BotAuthor,
    AlreadyProcessed,
    EmptyText,
}

/// What the pipeline did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    NoMatch,
    SendFailed,
    Reposted {
        repost_id: MessageId,
        /// True when the original is gone (deleted now or already missing).
        original_deleted: bool,
    },
}

/// `"<author>: <text>"`, cut to `max_len` chars with a trailing marker when too long.
pub fn format_repost(author_name: &str, text: &str, max_len: usize) -> String {
    let formatted = format!("{}: {}", author_name, text);
    if formatted.chars().count() <= max_len {
        return formatted;
    }
    let keep = max_len.saturating_sub(TRUNCATION_MARKER.len());
    let mut out: String = formatted.chars().take(keep).collect();
    out.extend(TRUNCATION_MARKER.chars().take(max_len - keep));
    out
}

fn log_task_exit(res: Result<(), JoinError>) {
    if let Err(e) = res {
        log::warn!("rewrite task failed: {}", e);
    }
}

/// Owns the pipeline's shared state and the platform client.
pub struct Rewriter {
    platform: Arc<dyn Platform>,
    rules: RuleRegistry,
    dedup: DedupGuard,
    serializer: ChannelSerializer,
    max_message_len: usize,
}

impl Rewriter {
    pub fn new(
        platform: Arc<dyn Platform>,
        rules: RuleRegistry,
        dedup: DedupGuard,
        serializer: ChannelSerializer,
    ) -> Self {
        Self {
            platform,
            rules,
            dedup,
            serializer,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }

    pub fn with_max_message_len(mut self, max_len: usize) -> Self {
        self.max_message_len = max_len;
        self
    }

    pub fn dedup(&self) -> &DedupGuard {
        &self.dedup
    }

    /// Consume inbound messages until the sender side closes, one task per message.
    /// Returns once every in-flight message has finished.
    pub async fn run(self: Arc<Self>, mut inbound_rx: mpsc::Receiver<InboundMessage>) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                msg = inbound_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let rewriter = self.clone();
                    tasks.spawn(async move {
                        let id = msg.id.clone();
                        let outcome = rewriter.handle(msg).await;
                        log::debug!("message {}: {:?}", id, outcome);
                    });
                }
                Some(res) = tasks.join_next(), if !tasks.is_empty() => log_task_exit(res),
            }
        }
        log::info!("rewrite: inbound channel closed, waiting for {} in-flight message(s)", tasks.len());
        while let Some(res) = tasks.join_next().await {
            log_task_exit(res);
        }
    }

    /// Run the full pipeline for one message.
    pub async fn handle(&self, msg: InboundMessage) -> Outcome {
        if msg.is_bot {
            return Outcome::Ignored(IgnoreReason::BotAuthor);
        }
        if self.dedup.contains(&msg.id).await {
            return Outcome::Ignored(IgnoreReason::AlreadyProcessed);
        }
        if msg.text.is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyText);
        }

        let _lock = self.serializer.lock(&msg.channel_id).await;
        // Another task may have consumed this id while we waited for the lock.
        if self.dedup.contains(&msg.id).await {
            return Outcome::Ignored(IgnoreReason::AlreadyProcessed);
        }
        let Some(result) = self.rules.find_first_match(&msg.text) else {
            return Outcome::NoMatch;
        };
        self.repost(&msg, result).await
    }

    async fn repost(&self, msg: &InboundMessage, result: RewriteResult) -> Outcome {
        let files = self.fetch_attachments(msg).await;
        let outbound = OutboundMessage {
            channel_id: msg.channel_id.clone(),
            text: format_repost(&msg.author_name, &result.new_text, self.max_message_len),
            files,
            link: Some(result.original),
        };
        let repost_id = match self.platform.send(outbound).await {
            Ok(id) => id,
            Err(PlatformError::Forbidden(_)) => {
                log::warn!("missing permissions to send message in channel {}", msg.channel_id);
                return Outcome::SendFailed;
            }
            Err(e) => {
                log::warn!("sending rewritten message to channel {} failed: {}", msg.channel_id, e);
                return Outcome::SendFailed;
            }
        };

        self.dedup.record(msg.id.clone()).await;
        self.dedup.record(repost_id.clone()).await;

        let original_deleted = result.delete_original && self.delete_original(msg).await;
        Outcome::Reposted {
            repost_id,
            original_deleted,
        }
    }

    /// Download every attachment; failed downloads are logged and left out.
    async fn fetch_attachments(&self, msg: &InboundMessage) -> Vec<FileUpload> {
        let mut files = Vec::with_capacity(msg.attachments.len());
        for attachment in &msg.attachments {
            match self.platform.fetch_attachment(attachment).await {
                Ok(data) => files.push(FileUpload {
                    filename: attachment.filename.clone(),
                    data,
                }),
                Err(e) => log::warn!("failed to re-attach file {}: {}", attachment.filename, e),
            }
        }
        files
    }

    async fn delete_original(&self, msg: &InboundMessage) -> bool {
        if !self.platform.has_delete_permission(&msg.channel_id).await {
            log::debug!("no delete permission in channel {}, keeping original", msg.channel_id);
            return false;
        }
        match self.platform.delete(&msg.channel_id, &msg.id).await {
            Ok(()) | Err(PlatformError::NotFound) => true,
            Err(PlatformError::Forbidden(_)) => {
                log::warn!("missing permission to delete message in channel {}", msg.channel_id);
                false
            }
            Err(e) => {
                log::warn!("deleting message {} failed: {}", msg.id, e);
                false
            }
        }
    }
}
