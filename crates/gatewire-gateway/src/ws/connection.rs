use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use gatewire_core::config::{HANDSHAKE_TIMEOUT_MS, HEARTBEAT_INTERVAL_SECS, MAX_PAYLOAD_BYTES};
use gatewire_core::now_ms;
use gatewire_protocol::{EventFrame, HelloParams, InboundFrame, PongFrame};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::dispatch;
use crate::ws::handshake::{self, AuthOutcome};

type WsSink = futures_util::stream::SplitSink<WebSocket, Message>;

/// WS connection state machine.
///
/// `AwaitingConnect` → `Authenticated` → (runs until close) → `Closing`.
/// The handshake must complete within `HANDSHAKE_TIMEOUT_MS` or the
/// connection is dropped.
enum ConnState {
    AwaitingConnect,
    Authenticated { scopes: Vec<String> },
    Closing,
}

/// Axum handler — upgrades HTTP to WebSocket at `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Per-connection task — lives for the entire WS session lifetime.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");
    state.ws_clients.insert(conn_id.clone(), ());

    let (mut tx, mut rx) = socket.split();
    let mut broadcast_rx = state.broadcaster.subscribe();

    let mut conn_state = ConnState::AwaitingConnect;

    let handshake_deadline =
        tokio::time::Instant::now() + std::time::Duration::from_millis(HANDSHAKE_TIMEOUT_MS);
    let mut handshake_timer = Box::pin(tokio::time::sleep_until(handshake_deadline));

    let mut tick_interval = tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_ref: &str = &text;
                        if text_ref.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id, size = text_ref.len(), "payload too large, dropping");
                            break;
                        }
                        conn_state = process_message(&conn_id, text_ref, conn_state, &mut tx, &state).await;
                        if matches!(conn_state, ConnState::Closing) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }

            event = broadcast_rx.recv() => {
                if let Ok(payload) = event {
                    if tx.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
            }

            _ = tick_interval.tick() => {
                if matches!(conn_state, ConnState::Authenticated { .. }) {
                    let seq = state.next_seq();
                    let tick = EventFrame::new("tick", json!({ "ts": now_ms() })).with_seq(seq);
                    if send_json(&mut tx, &tick).await.is_err() {
                        break;
                    }
                }
            }

            _ = &mut handshake_timer => {
                if matches!(conn_state, ConnState::AwaitingConnect) {
                    warn!(conn_id, "handshake timeout, closing connection");
                    break;
                }
            }
        }
    }

    state.ws_clients.remove(&conn_id);
    info!(conn_id, "WS connection closed");
}

/// Handle a single inbound text frame. Returns the new connection state.
async fn process_message(
    conn_id: &str,
    text: &str,
    state: ConnState,
    tx: &mut WsSink,
    app: &Arc<AppState>,
) -> ConnState {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id, error = %e, "malformed frame, ignoring");
            return state;
        }
    };

    match state {
        ConnState::AwaitingConnect => handle_hello(conn_id, frame, tx, app).await,
        ConnState::Authenticated { scopes } => handle_authenticated(frame, scopes, tx, app).await,
        ConnState::Closing => ConnState::Closing,
    }
}

/// Pre-auth: only a `hello` frame is accepted.
async fn handle_hello(conn_id: &str, frame: InboundFrame, tx: &mut WsSink, app: &Arc<AppState>) -> ConnState {
    if frame.frame_type != "hello" {
        warn!(conn_id, "frame before hello, closing");
        return ConnState::Closing;
    }

    let params: HelloParams = match serde_json::from_value(Value::Object(frame.rest)) {
        Ok(p) => p,
        Err(e) => {
            warn!(conn_id, error = %e, "invalid hello params");
            let _ = send_json(tx, &json!({ "type": "hello-error", "message": "invalid hello params" })).await;
            return ConnState::Closing;
        }
    };

    match handshake::verify_auth(&params, &app.config, &app.pairing, now_ms()) {
        AuthOutcome::Authorized { scopes } => {
            let hello_ok = handshake::hello_ok_payload(&params.node_id);
            let mut payload = serde_json::to_value(&hello_ok).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = payload {
                map.insert("type".to_string(), Value::String("hello-ok".to_string()));
            }
            if send_json(tx, &payload).await.is_err() {
                return ConnState::Closing;
            }
            info!(conn_id, node_id = %params.node_id, "client authenticated");
            ConnState::Authenticated { scopes }
        }
        AuthOutcome::PendingPairing(ack) => {
            let payload = json!({ "type": "pair-pending", "pairingId": ack.pairing_id, "status": ack.status });
            let _ = send_json(tx, &payload).await;
            info!(conn_id, node_id = %params.node_id, "pairing request filed, closing until approved");
            ConnState::Closing
        }
        AuthOutcome::Denied(reason) => {
            warn!(conn_id, %reason, "auth failed");
            let _ = send_json(tx, &json!({ "type": "hello-error", "message": reason })).await;
            ConnState::Closing
        }
    }
}

/// Post-auth: dispatch `request` frames, answer `ping` with `pong`.
async fn handle_authenticated(
    frame: InboundFrame,
    scopes: Vec<String>,
    tx: &mut WsSink,
    app: &Arc<AppState>,
) -> ConnState {
    if frame.is_ping() {
        let _ = send_json(tx, &PongFrame::reply_to(frame.ping_id())).await;
        return ConnState::Authenticated { scopes };
    }

    if let Some(req) = frame.as_request() {
        let res = dispatch::route(&req, &scopes, app).await;
        let _ = send_json(tx, &res).await;
    }
    ConnState::Authenticated { scopes }
}

async fn send_json<T: serde::Serialize>(tx: &mut WsSink, payload: &T) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).unwrap_or_default();
    tx.send(Message::Text(json.into())).await.map_err(axum::Error::new)
}
