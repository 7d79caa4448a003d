//! Platform client used by the rewrite pipeline: send, delete, fetch attachments, check permissions.

use async_trait::async_trait;

use super::inbound::{Attachment, ChannelId, MessageId};
use crate::rules::LinkAffordance;

/// A file to upload with an outbound message.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Message to post to a channel.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub channel_id: ChannelId,
    pub text: String,
    pub files: Vec<FileUpload>,
    /// Optional link button shown under the message.
    pub link: Option<LinkAffordance>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("missing permissions: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("platform api error: {0}")]
    Api(String),
}

/// Operations the rewrite pipeline needs from the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Post a message; returns the new message's id.
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, PlatformError>;

    /// Delete a message. `NotFound` means it is already gone.
    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError>;

    /// Download an attachment's bytes.
    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, PlatformError>;

    /// Whether the bot may delete other users' messages in the channel. Errors yield false.
    async fn has_delete_permission(&self, channel_id: &str) -> bool;
}
