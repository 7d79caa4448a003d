//! Discord gateway: WebSocket session (hello, identify, heartbeat) that turns
//! MESSAGE_CREATE dispatches into `InboundMessage`s.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::rest::DiscordClient;
use crate::channels::{Attachment, InboundMessage, PlatformError};

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
pub const GATEWAY_INTENTS: u64 = 1 | 512 | 32768;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_HEARTBEAT_MS: u64 = 41_250;

/// Close codes after which reconnecting cannot succeed (bad token, bad intents, ...).
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway url lookup failed: {0}")]
    Platform(#[from] PlatformError),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid gateway payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gateway protocol error: {0}")]
    Protocol(String),
    #[error("gateway closed the connection with code {0}: {1}")]
    Fatal(u16, String),
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub member: Option<GuildMember>,
    #[serde(default)]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub nick: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub id: String,
    pub filename: String,
    pub url: String,
}

impl From<MessageCreate> for InboundMessage {
    fn from(m: MessageCreate) -> Self {
        let author_name = m
            .member
            .and_then(|mem| mem.nick)
            .filter(|n| !n.is_empty())
            .or(m.author.global_name.filter(|n| !n.is_empty()))
            .unwrap_or(m.author.username);
        InboundMessage {
            id: m.id,
            channel_id: m.channel_id,
            author_name,
            text: m.content,
            attachments: m
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    id: a.id,
                    filename: a.filename,
                    url: a.url,
                })
                .collect(),
            is_bot: m.author.bot || m.webhook_id.is_some(),
        }
    }
}

/// How a single gateway session ended without an error.
enum SessionEnd {
    Stopped,
    Reconnect,
    InboundClosed,
}

/// Gateway connector: keeps a session open (reconnecting on failure) until stopped.
pub struct DiscordGateway {
    client: DiscordClient,
    token: String,
    running: AtomicBool,
}

impl DiscordGateway {
    pub fn new(client: DiscordClient, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            running: AtomicBool::new(false),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the gateway loop; inbound messages are forwarded to `inbound_tx`.
    pub fn start(self: Arc<Self>, inbound_tx: mpsc::Sender<InboundMessage>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("discord gateway: starting");
        tokio::spawn(async move {
            run_gateway_loop(self, inbound_tx).await;
        })
    }

    fn identify_payload(&self) -> Value {
        json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "embedfix",
                    "device": "embedfix"
                }
            }
        })
    }

    async fn run_session(
        &self,
        inbound_tx: &mpsc::Sender<InboundMessage>,
    ) -> Result<SessionEnd, GatewayError> {
        let url = self.client.gateway_url().await?;
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws.split();
        log::info!("discord gateway: connected to {}", url);

        let hello = match read.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str::<GatewayPayload>(&text)?,
            Some(Ok(other)) => {
                return Err(GatewayError::Protocol(format!("expected hello, got {:?}", other)))
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(GatewayError::Protocol("closed before hello".to_string())),
        };
        if hello.op != OP_HELLO {
            return Err(GatewayError::Protocol(format!("expected hello, got op {}", hello.op)));
        }
        let interval_ms = hello.d["heartbeat_interval"]
            .as_u64()
            .unwrap_or(DEFAULT_HEARTBEAT_MS);
        log::debug!("discord gateway: heartbeat interval {}ms", interval_ms);

        write
            .send(Message::Text(self.identify_payload().to_string()))
            .await?;

        let period = Duration::from_millis(interval_ms);
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut seq: Option<u64> = None;

        loop {
            if !self.running() {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Stopped);
            }
            tokio::select! {
                _ = heartbeat.tick() => {
                    write.send(heartbeat_frame(seq)).await?;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(close))) => {
                            let (code, reason) = close
                                .map(|c| (u16::from(c.code), c.reason.into_owned()))
                                .unwrap_or((1000, String::new()));
                            if FATAL_CLOSE_CODES.contains(&code) {
                                return Err(GatewayError::Fatal(code, reason));
                            }
                            log::info!("discord gateway: closed ({} {}), reconnecting", code, reason);
                            return Ok(SessionEnd::Reconnect);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(SessionEnd::Reconnect),
                    };
                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            log::debug!("discord gateway: skipping undecodable frame: {}", e);
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        seq = payload.s;
                    }
                    match payload.op {
                        OP_DISPATCH => {
                            if let Some(end) = self.dispatch(payload, inbound_tx).await {
                                return Ok(end);
                            }
                        }
                        OP_HEARTBEAT => write.send(heartbeat_frame(seq)).await?,
                        OP_RECONNECT | OP_INVALID_SESSION => {
                            log::info!("discord gateway: server requested reconnect (op {})", payload.op);
                            return Ok(SessionEnd::Reconnect);
                        }
                        OP_HEARTBEAT_ACK => {}
                        op => log::debug!("discord gateway: ignoring op {}", op),
                    }
                }
            }
        }
    }

    /// Handle a dispatch event. Returns `Some` when the session should end.
    async fn dispatch(
        &self,
        payload: GatewayPayload,
        inbound_tx: &mpsc::Sender<InboundMessage>,
    ) -> Option<SessionEnd> {
        match payload.t.as_deref() {
            Some("READY") => {
                let name = payload.d["user"]["username"].as_str().unwrap_or("?");
                let guilds = payload.d["guilds"].as_array().map(|g| g.len()).unwrap_or(0);
                log::info!("discord gateway: logged in as {} ({} guilds)", name, guilds);
                None
            }
            Some("MESSAGE_CREATE") => {
                let msg = match serde_json::from_value::<MessageCreate>(payload.d) {
                    Ok(m) => m,
                    Err(e) => {
                        log::debug!("discord gateway: bad MESSAGE_CREATE payload: {}", e);
                        return None;
                    }
                };
                if inbound_tx.send(msg.into()).await.is_err() {
                    log::debug!("discord gateway: inbound channel closed, stopping loop");
                    return Some(SessionEnd::InboundClosed);
                }
                None
            }
            _ => None,
        }
    }
}

fn heartbeat_frame(seq: Option<u64>) -> Message {
    Message::Text(json!({ "op": OP_HEARTBEAT, "d": seq }).to_string())
}

async fn run_gateway_loop(gateway: Arc<DiscordGateway>, inbound_tx: mpsc::Sender<InboundMessage>) {
    while gateway.running() {
        match gateway.run_session(&inbound_tx).await {
            Ok(SessionEnd::Stopped) | Ok(SessionEnd::InboundClosed) => break,
            Ok(SessionEnd::Reconnect) => {}
            Err(GatewayError::Fatal(code, reason)) => {
                log::error!("discord gateway: fatal close {} ({}), giving up", code, reason);
                break;
            }
            Err(e) => log::warn!("discord gateway error: {}", e),
        }
        if gateway.running() {
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
    gateway.stop();
    log::info!("discord gateway: loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json(extra: Value) -> Value {
        let mut base = json!({
            "id": "100",
            "channel_id": "200",
            "content": "https://x.com/a/status/1",
            "author": { "id": "300", "username": "alice" },
            "attachments": [
                { "id": "9", "filename": "cat.png", "url": "https://cdn.example/cat.png", "size": 10 }
            ]
        });
        if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        base
    }

    fn decode(v: Value) -> InboundMessage {
        serde_json::from_value::<MessageCreate>(v).unwrap().into()
    }

    #[test]
    fn intents_include_message_content() {
        assert_eq!(GATEWAY_INTENTS & 32768, 32768);
        assert_eq!(GATEWAY_INTENTS & 512, 512);
        assert_eq!(GATEWAY_INTENTS & 1, 1);
    }

    #[test]
    fn decodes_message_create() {
        let m = decode(message_json(json!({})));
        assert_eq!(m.id, "100");
        assert_eq!(m.channel_id, "200");
        assert_eq!(m.author_name, "alice");
        assert!(!m.is_bot);
        assert_eq!(m.attachments.len(), 1);
        assert_eq!(m.attachments[0].filename, "cat.png");
    }

    #[test]
    fn display_name_prefers_nick_then_global_name() {
        let m = decode(message_json(json!({
            "author": { "id": "1", "username": "alice", "global_name": "Alice A" },
            "member": { "nick": "ally" }
        })));
        assert_eq!(m.author_name, "ally");
        let m = decode(message_json(json!({
            "author": { "id": "1", "username": "alice", "global_name": "Alice A" },
            "member": { "nick": null }
        })));
        assert_eq!(m.author_name, "Alice A");
    }

    #[test]
    fn empty_nick_falls_back_to_global_name() {
        let m = decode(message_json(json!({
            "author": { "id": "1", "username": "alice", "global_name": "Alice A" },
            "member": { "nick": "" }
        })));
        assert_eq!(m.author_name, "Alice A");
        let m = decode(message_json(json!({
            "author": { "id": "1", "username": "alice", "global_name": "" },
            "member": { "nick": "" }
        })));
        assert_eq!(m.author_name, "alice");
    }

    #[test]
    fn bots_and_webhooks_are_flagged() {
        let m = decode(message_json(json!({
            "author": { "id": "1", "username": "robo", "bot": true }
        })));
        assert!(m.is_bot);
        let m = decode(message_json(json!({ "webhook_id": "55" })));
        assert!(m.is_bot);
    }

    #[test]
    fn heartbeat_carries_sequence() {
        let Message::Text(text) = heartbeat_frame(Some(42)) else {
            panic!("expected text frame");
        };
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["op"], 1);
        assert_eq!(v["d"], 42);
        let Message::Text(text) = heartbeat_frame(None) else {
            panic!("expected text frame");
        };
        let v: Value = serde_json::from_str(&text).unwrap();
        assert!(v["d"].is_null());
    }

    #[test]
    fn identify_uses_token_and_intents() {
        let client = DiscordClient::new("secret", None);
        let gw = DiscordGateway::new(client, "secret");
        let p = gw.identify_payload();
        assert_eq!(p["op"], 2);
        assert_eq!(p["d"]["token"], "secret");
        assert_eq!(p["d"]["intents"], GATEWAY_INTENTS);
    }
}
