use serde::{Deserialize, Serialize};

/// The canonical inbound envelope, produced by a channel adapter on receipt
/// and owned exclusively by the reply pipeline for the lifetime of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgContext {
    pub body: String,
    /// Opaque channel-scoped sender id.
    pub from: String,
    /// Opaque recipient id.
    pub to: String,
    /// One of the registered channel ids.
    pub channel: String,
    /// Which channel account received it.
    pub account_id: String,
    pub chat_type: ChatType,
    pub message_sid: String,
    /// Milliseconds since epoch, UTC.
    pub timestamp: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub group_subject: Option<String>,
    #[serde(default)]
    pub media_path: Vec<String>,
    #[serde(default)]
    pub media_url: Vec<String>,
    #[serde(default)]
    pub media_remote_host: Option<String>,
    #[serde(default)]
    pub is_heartbeat: bool,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Direct,
    Group,
    Channel,
    Thread,
}

/// A channel plugin capability. The core never inspects a plugin beyond
/// what it declares here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Send,
    Receive,
    Directory,
    Threading,
    TypingIndicator,
    EditMessage,
    Reactions,
    Media,
}

/// An outbound reply item. The core never constructs `blocks` itself;
/// channel plugins may, from the plain fields here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_tag: Option<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

impl ReplyPayload {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            text: Some(s.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.media_url.is_none() && self.media_urls.is_empty()
    }
}

/// The synchronous return of the reply pipeline: an ordered list of
/// payloads. May be empty, meaning "no reply".
pub type InboundAck = Vec<ReplyPayload>;

/// The result of a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub message_id: String,
    pub channel_id: String,
}

/// A target resolved from a raw, platform-specific reference
/// (e.g. Slack `@U123` → `user:U123`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTarget(pub String);

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub subject: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendOpts {
    pub thread_id: Option<String>,
}
