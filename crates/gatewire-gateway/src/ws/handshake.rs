use gatewire_core::config::{AuthMode, GatewayConfig, PROTOCOL_VERSION, MAX_PAYLOAD_BYTES, HEARTBEAT_INTERVAL_SECS};
use gatewire_pairing::PairingStore;
use gatewire_protocol::{ClientPolicy, HelloOk, HelloParams, PairRequestAck, ServerFeatures, ServerInfo};

/// Outcome of validating a `hello` frame against the configured auth mode
/// and the pairing store.
pub enum AuthOutcome {
    Authorized { scopes: Vec<String> },
    PendingPairing(PairRequestAck),
    Denied(String),
}

/// Verify a `hello` frame's credentials.
///
/// - `AuthMode::None` admits every caller with full scope.
/// - `AuthMode::Token` checks the static operator token first, then falls
///   back to a per-node pairing token; a node with neither files a pairing
///   request and the caller is told to wait for operator approval.
pub fn verify_auth(
    params: &HelloParams,
    config: &GatewayConfig,
    pairing: &PairingStore,
    now_ms: i64,
) -> AuthOutcome {
    match config.auth.mode {
        AuthMode::None => AuthOutcome::Authorized {
            scopes: vec!["operator.admin".to_string()],
        },
        AuthMode::Token => {
            let Some(token) = &params.token else {
                return request_pairing(params, pairing, now_ms);
            };
            if Some(token) == config.auth.token.as_ref() {
                return AuthOutcome::Authorized {
                    scopes: vec!["operator.admin".to_string()],
                };
            }
            match pairing.verify_token(&params.node_id, token) {
                Some(node) => AuthOutcome::Authorized { scopes: node.scopes },
                None => AuthOutcome::Denied("invalid token".to_string()),
            }
        }
    }
}

fn request_pairing(params: &HelloParams, pairing: &PairingStore, now_ms: i64) -> AuthOutcome {
    match pairing.request_pairing(
        &params.node_id,
        params.display_name.clone(),
        params.platform.clone(),
        params.version.clone(),
        None,
        now_ms,
    ) {
        Ok(pending) => AuthOutcome::PendingPairing(PairRequestAck {
            pairing_id: pending.request_id,
            status: "pending".to_string(),
        }),
        Err(err) => AuthOutcome::Denied(err.to_string()),
    }
}

/// Build the `hello-ok` response payload after successful authentication.
pub fn hello_ok_payload(node_id: &str) -> HelloOk {
    HelloOk {
        protocol: PROTOCOL_VERSION,
        server: ServerInfo {
            name: "gatewire".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_id: node_id.to_string(),
        },
        features: ServerFeatures {
            streaming: false,
            multi_agent: false,
            persistent_sessions: true,
            node_pairing: true,
        },
        snapshot: serde_json::Value::Object(Default::default()),
        policy: ClientPolicy {
            max_message_size: MAX_PAYLOAD_BYTES,
            heartbeat_interval_secs: HEARTBEAT_INTERVAL_SECS,
        },
    }
}
