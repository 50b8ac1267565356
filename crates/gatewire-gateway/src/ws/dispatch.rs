use std::sync::Arc;

use gatewire_channels::{ChatType, MsgContext};
use gatewire_core::{now_ms, GatewayError};
use gatewire_protocol::{is_authorized, is_known_method, methods, RequestFrame, ResponseFrame};
use gatewire_sessions::{ListFilter, SessionEntry, SessionKey, SessionPatch};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;

/// Route one parsed request frame to its handler, after the unknown-method
/// and scope checks. This is the only place in the gateway that turns a
/// `GatewayError` into a wire error frame.
pub async fn route(req: &RequestFrame, scopes: &[String], state: &Arc<AppState>) -> ResponseFrame {
    if !is_known_method(&req.method) {
        return ResponseFrame::err(&req.id, "METHOD_NOT_FOUND", &format!("unknown method '{}'", req.method));
    }
    if !is_authorized(&req.method, scopes) {
        return ResponseFrame::err(&req.id, "UNAUTHORIZED", "caller's scopes do not permit this method");
    }

    let result = dispatch(req, state).await;
    match result {
        Ok(payload) => ResponseFrame::ok(&req.id, payload),
        Err(err) => ResponseFrame::err(&req.id, err.code(), &err.to_string()),
    }
}

async fn dispatch(req: &RequestFrame, state: &Arc<AppState>) -> Result<Value, GatewayError> {
    match req.method.as_str() {
        methods::HEALTH => Ok(health_payload(state)),
        methods::CHANNELS_STATUS => Ok(channels_status_payload(state)),
        methods::SESSIONS_LIST => sessions_list(state, req.params.as_ref()),
        methods::SESSIONS_RESOLVE => sessions_resolve(state, req.params.as_ref()),
        methods::SESSIONS_PATCH => sessions_patch(state, req.params.as_ref()),
        methods::SESSIONS_RESET | methods::SESSIONS_DELETE => sessions_delete(state, req.params.as_ref()),
        methods::CHAT_HISTORY => chat_history(state, req.params.as_ref()),
        methods::SEND | methods::CHAT_SEND => send_message(state, req.params.as_ref()).await,
        methods::CHAT_ABORT => chat_abort(state, req.params.as_ref()),
        methods::NODE_PAIR_REQUEST => node_pair_request(state, req.params.as_ref()),
        methods::NODE_PAIR_LIST => Ok(node_pair_list(state)),
        methods::NODE_PAIR_APPROVE => node_pair_approve(state, req.params.as_ref()),
        methods::NODE_PAIR_REJECT => node_pair_reject(state, req.params.as_ref()),
        methods::DEVICE_TOKEN_ROTATE => device_token_rotate(state, req.params.as_ref()),
        methods::DEVICE_TOKEN_REVOKE => device_token_revoke(state, req.params.as_ref()),
        other => Err(GatewayError::Unavailable(format!("method '{other}' is not implemented yet"))),
    }
}

fn param<T: DeserializeOwned>(params: Option<&Value>) -> Result<T, GatewayError> {
    let value = params
        .cloned()
        .ok_or_else(|| GatewayError::InvalidRequest("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

fn resolve_key(state: &AppState, display: &str) -> Result<SessionKey, GatewayError> {
    state
        .sessions
        .resolve(&state.agent_id, display)
        .ok_or_else(|| GatewayError::NotFound(format!("no session matches '{display}'")))
}

fn health_payload(state: &AppState) -> Value {
    json!({
        "status": "ok",
        "protocol": gatewire_core::config::PROTOCOL_VERSION,
        "wsClients": state.ws_clients.len(),
    })
}

fn channels_status_payload(state: &AppState) -> Value {
    let channels: Vec<Value> = state
        .channels
        .statuses()
        .into_iter()
        .map(|(id, status)| json!({ "id": id, "status": status }))
        .collect();
    json!({ "channels": channels })
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SessionsListParams {
    limit: Option<usize>,
    active_minutes: Option<u64>,
    spawned_by: Option<String>,
}

fn sessions_list(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: SessionsListParams = match params {
        Some(_) => param(params)?,
        None => SessionsListParams::default(),
    };
    let entries = state.sessions.list(ListFilter {
        limit: p.limit,
        active_minutes: p.active_minutes,
        spawned_by: p.spawned_by,
        now_ms: now_ms(),
    });
    let sessions: Vec<Value> = entries
        .into_iter()
        .map(|(key, entry)| session_summary(&key, &entry))
        .collect();
    Ok(json!({ "sessions": sessions }))
}

fn session_summary(key: &SessionKey, entry: &SessionEntry) -> Value {
    json!({
        "key": key.as_str(),
        "sessionId": entry.session_id,
        "updatedAt": entry.updated_at,
        "label": entry.label,
        "model": entry.model_override,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayParams {
    display: String,
}

fn sessions_resolve(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: DisplayParams = param(params)?;
    let key = resolve_key(state, &p.display)?;
    let entry = state.sessions.get(&key);
    Ok(json!({ "key": key.as_str(), "session": entry.map(|e| session_summary(&key, &e)) }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionsPatchParams {
    key: String,
    patch: SessionPatch,
}

fn sessions_patch(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: SessionsPatchParams = param(params)?;
    let key = resolve_key(state, &p.key)?;
    let entry = state
        .sessions
        .patch(&key, now_ms(), |entry| apply_patch(entry, &key, &p.patch, &state.config))
        .map_err(GatewayError::from)?;
    Ok(session_summary(&key, &entry))
}

/// Applies a `SessionPatch`'s present fields to an entry in place. Each
/// field distinguishes "omitted" (`None`, leave alone) from "present"
/// (`Some(value)`, which may itself be `None` to clear the field).
///
/// `modelOverride` and `spawnedBy` carry extra invariants beyond "set the
/// field": a model must be in the configured allowed set, and `spawnedBy`
/// may only be set once, and only on a subagent key.
fn apply_patch(
    entry: &mut SessionEntry,
    key: &SessionKey,
    patch: &SessionPatch,
    config: &gatewire_core::config::GatewayConfig,
) -> gatewire_sessions::error::Result<()> {
    if let Some(v) = &patch.label {
        entry.label = v.clone();
    }
    if let Some(v) = &patch.thinking_level {
        entry.thinking_level = *v;
    }
    if let Some(v) = &patch.verbose_level {
        entry.verbose_level = *v;
    }
    if let Some(v) = &patch.reasoning_level {
        entry.reasoning_level = *v;
    }
    if let Some(v) = &patch.elevated_level {
        entry.elevated_level = *v;
    }
    if let Some(v) = &patch.response_usage {
        entry.response_usage = *v;
    }
    if let Some(v) = &patch.send_policy {
        entry.send_policy = *v;
    }
    if let Some(v) = &patch.group_activation {
        entry.group_activation = *v;
    }
    if let Some(v) = &patch.provider_override {
        entry.provider_override = v.clone();
    }
    if let Some(v) = &patch.model_override {
        if let Some(model) = v {
            if !config.is_model_allowed(model) {
                return Err(gatewire_sessions::SessionError::Validation(format!(
                    "model '{model}' is not in the allowed set"
                )));
            }
        }
        entry.model_override = v.clone();
    }
    if let Some(v) = &patch.spawned_by {
        match v {
            Some(parent) => {
                if entry.spawned_by.is_some() {
                    return Err(gatewire_sessions::SessionError::Validation(
                        "spawnedBy is already set and cannot be changed".to_string(),
                    ));
                }
                if !key.is_subagent() {
                    return Err(gatewire_sessions::SessionError::Validation(
                        "spawnedBy can only be set on a subagent session key".to_string(),
                    ));
                }
                entry.spawned_by = Some(parent.clone());
            }
            None => entry.spawned_by = None,
        }
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionKeyParams {
    key: String,
}

fn sessions_delete(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: SessionKeyParams = param(params)?;
    let key = resolve_key(state, &p.key)?;
    state.sessions.delete(&key).map_err(GatewayError::from)?;
    Ok(json!({ "deleted": key.as_str() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatHistoryParams {
    key: String,
    #[serde(default)]
    limit: Option<usize>,
}

fn chat_history(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: ChatHistoryParams = param(params)?;
    let key = resolve_key(state, &p.key)?;
    let entry = state
        .sessions
        .get(&key)
        .ok_or_else(|| GatewayError::NotFound(format!("no session for '{}'", p.key)))?;
    let messages = match p.limit {
        Some(n) => state.transcripts.tail(&entry.session_id, n),
        None => state.transcripts.read_all(&entry.session_id),
    }
    .map_err(GatewayError::from)?;
    Ok(json!({ "key": key.as_str(), "messages": messages }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendParams {
    channel: String,
    to: String,
    body: String,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    chat_type: Option<String>,
}

async fn send_message(state: &Arc<AppState>, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: SendParams = param(params)?;
    let chat_type = match p.chat_type.as_deref() {
        Some("group") => ChatType::Group,
        Some("channel") => ChatType::Channel,
        Some("thread") => ChatType::Thread,
        _ => ChatType::Direct,
    };
    let msg = MsgContext {
        body: p.body,
        from: p.to.clone(),
        to: p.to,
        channel: p.channel,
        account_id: p.account_id.unwrap_or_else(|| "default".to_string()),
        chat_type,
        message_sid: Uuid::new_v4().to_string(),
        timestamp: now_ms(),
        sender_name: None,
        group_subject: None,
        media_path: Vec::new(),
        media_url: Vec::new(),
        media_remote_host: None,
        is_heartbeat: false,
        thread_id: None,
    };
    state.orchestrator.handle_inbound(msg).await;
    Ok(json!({ "queued": true }))
}

fn chat_abort(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: SessionKeyParams = param(params)?;
    let key = resolve_key(state, &p.key)?;
    state.orchestrator.abort_session(&key);
    Ok(json!({ "aborted": key.as_str() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodePairRequestParams {
    node_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

fn node_pair_request(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: NodePairRequestParams = param(params)?;
    let pending = state
        .pairing
        .request_pairing(&p.node_id, p.display_name, p.platform, p.version, None, now_ms())
        .map_err(GatewayError::from)?;
    Ok(json!({ "pairingId": pending.request_id, "status": "pending" }))
}

fn node_pair_list(state: &AppState) -> Value {
    json!({
        "pending": state.pairing.list_pending(),
        "paired": state.pairing.list_paired(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodePairApproveParams {
    request_id: String,
    #[serde(default)]
    scopes: Option<Vec<String>>,
}

fn node_pair_approve(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: NodePairApproveParams = param(params)?;
    let scopes = p.scopes.unwrap_or_else(|| vec!["operator.read".to_string()]);
    let token = state
        .pairing
        .approve(&p.request_id, scopes, now_ms())
        .map_err(GatewayError::from)?;
    Ok(json!({ "token": token }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestIdParams {
    request_id: String,
}

fn node_pair_reject(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: RequestIdParams = param(params)?;
    state.pairing.reject(&p.request_id).map_err(GatewayError::from)?;
    Ok(json!({ "rejected": p.request_id }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeIdParams {
    node_id: String,
}

fn device_token_rotate(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: NodeIdParams = param(params)?;
    let token = state.pairing.rotate_token(&p.node_id).map_err(GatewayError::from)?;
    Ok(json!({ "token": token }))
}

fn device_token_revoke(state: &AppState, params: Option<&Value>) -> Result<Value, GatewayError> {
    let p: NodeIdParams = param(params)?;
    state.pairing.revoke(&p.node_id).map_err(GatewayError::from)?;
    Ok(json!({ "revoked": p.node_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatewire_core::config::GatewayConfig;

    fn patch_with_spawned_by(v: Option<&str>) -> SessionPatch {
        SessionPatch {
            spawned_by: Some(v.map(String::from)),
            ..Default::default()
        }
    }

    fn patch_with_model(v: &str) -> SessionPatch {
        SessionPatch {
            model_override: Some(Some(v.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn spawned_by_rejected_on_non_subagent_key() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let key = SessionKey::main("support");
        let config = GatewayConfig::default();
        let err = apply_patch(&mut entry, &key, &patch_with_spawned_by(Some("agent:support:main")), &config)
            .unwrap_err();
        assert!(err.to_string().contains("subagent"));
        assert!(entry.spawned_by.is_none());
    }

    #[test]
    fn spawned_by_set_once_on_subagent_key_succeeds() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let key = SessionKey::subagent("support", "task-1");
        let config = GatewayConfig::default();
        apply_patch(&mut entry, &key, &patch_with_spawned_by(Some("agent:support:main")), &config).unwrap();
        assert_eq!(entry.spawned_by.as_deref(), Some("agent:support:main"));
    }

    #[test]
    fn spawned_by_rejected_once_already_set() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        entry.spawned_by = Some("agent:support:main".to_string());
        let key = SessionKey::subagent("support", "task-1");
        let config = GatewayConfig::default();
        let err = apply_patch(&mut entry, &key, &patch_with_spawned_by(Some("agent:other:main")), &config)
            .unwrap_err();
        assert!(err.to_string().contains("already set"));
        assert_eq!(entry.spawned_by.as_deref(), Some("agent:support:main"));
    }

    #[test]
    fn model_override_rejected_when_not_in_allowed_set() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let key = SessionKey::main("support");
        let config = GatewayConfig::default();
        let err = apply_patch(&mut entry, &key, &patch_with_model("totally-made-up"), &config).unwrap_err();
        assert!(err.to_string().contains("allowed set"));
        assert!(entry.model_override.is_none());
    }

    #[test]
    fn model_override_allowed_when_in_allowed_set() {
        let mut entry = SessionEntry::new("s1".to_string(), 0);
        let key = SessionKey::main("support");
        let mut config = GatewayConfig::default();
        config.allowed_models.push("gpt-extra".to_string());
        apply_patch(&mut entry, &key, &patch_with_model("gpt-extra"), &config).unwrap();
        assert_eq!(entry.model_override.as_deref(), Some("gpt-extra"));
    }
}
