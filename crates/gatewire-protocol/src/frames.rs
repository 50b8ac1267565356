use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An operator CLI, dashboard, or peer node's call into the RPC surface
/// (`§4.9`/`§4.10` method table): `{ "type": "request", "id", "method", "params" }`.
/// `id` is caller-chosen and echoed back on the matching [`ResponseFrame`],
/// and on every [`EventFrame`] streamed for a long-running method before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// The single terminal reply to a [`RequestFrame`]. Exactly one of
/// `payload`/`error` is present, gated by `ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            frame_type: "response".to_string(),
            id: id.into(),
            ok: true,
            payload: Some(serde_json::to_value(payload).unwrap_or(Value::Null)),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: &str, message: &str) -> Self {
        Self {
            frame_type: "response".to_string(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Server → Client unsolicited push event.
/// Wire: `{ "type": "event", "event": "tick", "payload": {...}, "seq": 42 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_version: Option<StateVersion>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            frame_type: "event".to_string(),
            event: event.into(),
            payload: Some(serde_json::to_value(payload).unwrap_or(Value::Null)),
            seq: None,
            state_version: None,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// Bidirectional heartbeat frames: `{ "type": "ping", "id": "..." }` /
/// `{ "type": "pong", "id": "..." }`. Either side may originate a `ping`;
/// the receiver must echo the same `id` back on its `pong` so the
/// originator can match the round trip (and measure latency) when several
/// pings are in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PingFrame {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            frame_type: "ping".to_string(),
            id: Some(id.into()),
        }
    }
}

impl Default for PingFrame {
    fn default() -> Self {
        Self {
            frame_type: "ping".to_string(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PongFrame {
    /// Build the reply to an inbound ping, carrying over its `id` (if any).
    pub fn reply_to(id: Option<String>) -> Self {
        Self {
            frame_type: "pong".to_string(),
            id,
        }
    }
}

impl Default for PongFrame {
    fn default() -> Self {
        Self {
            frame_type: "pong".to_string(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<u64>,
}

/// Raw inbound frame — parse the `type` discriminator first, then extract body.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl InboundFrame {
    /// Try to interpret this frame as a client request.
    pub fn as_request(&self) -> Option<RequestFrame> {
        if self.frame_type != "request" {
            return None;
        }
        let mut map = self.rest.clone();
        map.insert("type".to_string(), Value::String("request".to_string()));
        serde_json::from_value(Value::Object(map)).ok()
    }

    pub fn is_ping(&self) -> bool {
        self.frame_type == "ping"
    }

    /// The `id` carried on an inbound `ping`, if present, to echo back on
    /// the `pong`. `None` for any other frame type or a ping with no id.
    pub fn ping_id(&self) -> Option<String> {
        if self.frame_type != "ping" {
            return None;
        }
        self.rest.get("id").and_then(Value::as_str).map(str::to_string)
    }
}
