//! Discord REST client: post/delete messages, download attachments, and check permissions.

use async_trait::async_trait;
use reqwest::{multipart, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::permissions::{self, Overwrite, PermissionContext, Role};
use crate::channels::{Attachment, MessageId, OutboundMessage, Platform, PlatformError};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Thread channel types; their permission overwrites live on the parent channel.
const THREAD_TYPES: [u8; 3] = [10, 11, 12];

#[derive(Debug, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GatewayBot {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    permission_overwrites: Vec<Overwrite>,
}

#[derive(Debug, Deserialize)]
struct Guild {
    owner_id: String,
    #[serde(default)]
    roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    roles: Vec<String>,
}

/// Client for the Discord HTTP API, authenticated as a bot.
#[derive(Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    /// Bot's own user id; set after `current_user` succeeds. Needed for permission checks.
    user_id: Option<String>,
    client: reqwest::Client,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_base,
            token: token.into(),
            user_id: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.api_base, path);
        let res = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    /// GET /users/@me — the bot account's identity.
    pub async fn current_user(&self) -> Result<CurrentUser, PlatformError> {
        self.get_json("/users/@me").await
    }

    /// GET /gateway/bot — WebSocket URL with version and encoding query appended.
    pub async fn gateway_url(&self) -> Result<String, PlatformError> {
        let data: GatewayBot = self.get_json("/gateway/bot").await?;
        Ok(format!("{}/?v=10&encoding=json", data.url.trim_end_matches('/')))
    }

    async fn delete_permission(&self, channel_id: &str) -> Result<bool, PlatformError> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Ok(false);
        };
        let mut channel: Channel = self.get_json(&format!("/channels/{}", channel_id)).await?;
        if THREAD_TYPES.contains(&channel.kind) {
            if let Some(parent) = channel.parent_id.clone() {
                let parent: Channel = self.get_json(&format!("/channels/{}", parent)).await?;
                channel.permission_overwrites = parent.permission_overwrites;
            }
        }
        let Some(guild_id) = channel.guild_id else {
            return Ok(false);
        };
        let guild: Guild = self.get_json(&format!("/guilds/{}", guild_id)).await?;
        let member: Member = self
            .get_json(&format!("/guilds/{}/members/{}", guild_id, user_id))
            .await?;
        let perms = permissions::compute_channel_permissions(&PermissionContext {
            guild_id: &guild_id,
            owner_id: &guild.owner_id,
            user_id,
            guild_roles: &guild.roles,
            member_roles: &member.roles,
            overwrites: &channel.permission_overwrites,
        });
        Ok(perms & permissions::MANAGE_MESSAGES != 0)
    }
}

/// Map a non-success response to `PlatformError` (403 forbidden, 404 not found, else api error).
async fn check_status(res: Response) -> Result<Response, PlatformError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::FORBIDDEN => PlatformError::Forbidden(body),
        StatusCode::NOT_FOUND => PlatformError::NotFound,
        _ => PlatformError::Api(format!("{} {}", status, body)),
    })
}

/// JSON payload for a create-message call: content, optional link button, attachment slots.
pub fn message_payload(message: &OutboundMessage) -> serde_json::Value {
    let mut body = json!({ "content": message.text });
    if let Some(ref link) = message.link {
        body["components"] = json!([{
            "type": 1,
            "components": [{
                "type": 2,
                "style": 5,
                "label": link.label,
                "url": link.url,
            }]
        }]);
    }
    if !message.files.is_empty() {
        let slots: Vec<_> = message
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| json!({ "id": i, "filename": f.filename }))
            .collect();
        body["attachments"] = json!(slots);
    }
    body
}

#[async_trait]
impl Platform for DiscordClient {
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, PlatformError> {
        let url = format!("{}/channels/{}/messages", self.api_base, message.channel_id);
        let payload = message_payload(&message);
        let req = self.client.post(&url).header("Authorization", self.auth());
        let req = if message.files.is_empty() {
            req.json(&payload)
        } else {
            let mut form = multipart::Form::new().text("payload_json", payload.to_string());
            for (i, file) in message.files.into_iter().enumerate() {
                let part = multipart::Part::bytes(file.data).file_name(file.filename);
                form = form.part(format!("files[{}]", i), part);
            }
            req.multipart(form)
        };
        let res = check_status(req.send().await?).await?;
        let created: CreatedMessage = res.json().await?;
        Ok(created.id)
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), PlatformError> {
        let url = format!("{}/channels/{}/messages/{}", self.api_base, channel_id, message_id);
        let res = self
            .client
            .delete(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        check_status(res).await?;
        Ok(())
    }

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>, PlatformError> {
        let res = self.client.get(&attachment.url).send().await?;
        let res = check_status(res).await?;
        Ok(res.bytes().await?.to_vec())
    }

    async fn has_delete_permission(&self, channel_id: &str) -> bool {
        match self.delete_permission(channel_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                log::debug!("discord: permission lookup for channel {} failed: {}", channel_id, e);
                false
            }
        }
    }
}
