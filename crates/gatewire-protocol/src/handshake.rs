use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → Server: opening frame on WS connect.
/// Sent as: `{ "type": "hello", "nodeId": "...", "token": "...", ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloParams {
    pub node_id: String,
    /// Empty/omitted when the node has not yet paired — triggers the
    /// pair-request flow instead of an immediate hello-ok.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Server → Client: successful auth response payload.
/// Sent as: `{ "type": "response", ..., "payload": { "protocol": 3, ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloOk {
    pub protocol: u32,
    pub server: ServerInfo,
    pub features: ServerFeatures,
    pub snapshot: Value,
    pub policy: ClientPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerFeatures {
    pub streaming: bool,
    pub multi_agent: bool,
    pub persistent_sessions: bool,
    pub node_pairing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientPolicy {
    pub max_message_size: usize,
    pub heartbeat_interval_secs: u64,
}

/// Server → Client: the node has no valid token yet and must wait for an
/// operator to approve its pairing request out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRequestAck {
    pub pairing_id: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_params_token_round_trips() {
        let raw = serde_json::json!({
            "nodeId": "node-1",
            "token": "abc",
            "displayName": "My Node",
        });
        let params: HelloParams = serde_json::from_value(raw).unwrap();
        assert_eq!(params.node_id, "node-1");
        assert_eq!(params.token.as_deref(), Some("abc"));
        assert_eq!(params.display_name.as_deref(), Some("My Node"));
        assert!(params.platform.is_none());
    }

    #[test]
    fn hello_params_without_token_triggers_pairing() {
        let raw = serde_json::json!({"nodeId": "node-2"});
        let params: HelloParams = serde_json::from_value(raw).unwrap();
        assert!(params.token.is_none());
    }

    #[test]
    fn hello_ok_protocol_version() {
        let ok = HelloOk {
            protocol: 3,
            server: ServerInfo {
                name: "gateway".to_string(),
                version: "0.1.0".to_string(),
                node_id: "srv-1".to_string(),
            },
            features: ServerFeatures::default(),
            snapshot: Value::Null,
            policy: ClientPolicy::default(),
        };
        assert_eq!(ok.protocol, 3);
    }
}
