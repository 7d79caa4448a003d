//! Inbound message from a chat channel: delivered to the rewrite pipeline.

/// Platform message identifier (opaque, e.g. a Discord snowflake).
pub type MessageId = String;

/// Platform channel identifier.
pub type ChannelId = String;

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    /// Download URL for the file's bytes.
    pub url: String,
}

/// A message received from a channel. Immutable once received.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Name shown for the author (nickname when set).
    pub author_name: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Authored by a bot account or a webhook.
    pub is_bot: bool,
}
