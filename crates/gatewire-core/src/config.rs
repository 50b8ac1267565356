use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Protocol constants — must match the gateway wire protocol exactly.
pub const PROTOCOL_VERSION: u32 = 3;
pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per frame
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024; // 1 MB: slow consumer threshold
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // close if client doesn't auth in 10s
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // ping/pong cadence

pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_QUEUE_MAX: usize = 20;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

const STATE_DIR_ENV: &str = "OPENCLAW_STATE_DIR";
const STATE_DIR_ENV_LEGACY: &str = "CLAWDBOT_STATE_DIR";

/// Top-level config (`gateway.toml` + `GATEWAY_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub state_dir: Option<String>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub channels: ChannelLimitsConfig,
    #[serde(default = "default_agent_model")]
    pub agent_model: String,
    /// Models a session is allowed to switch to via `/model` or
    /// `sessions.patch.modelOverride`, on top of `agent_model` itself. In
    /// practice this is config defaults unioned with whatever the active
    /// provider's catalogue advertises; the catalogue union happens where
    /// the provider is constructed, so this field only carries the
    /// config-supplied half.
    #[serde(default = "default_allowed_models")]
    pub allowed_models: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            auth: AuthConfig::default(),
            state_dir: None,
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            channels: ChannelLimitsConfig::default(),
            agent_model: default_agent_model(),
            allowed_models: default_allowed_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Static operator token, used when `mode` is `token` and no per-node
    /// pairing token has been issued yet (first-run bootstrap).
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Token,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    #[default]
    Token,
    None,
}

/// Inbound message queue knobs — debounce window and overflow policy. See
/// the per-session queue component for how these are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_queue_max")]
    pub max: usize,
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max: default_queue_max(),
            drop_policy: DropPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DropPolicy {
    #[default]
    Summarize,
    Old,
    New,
}

/// Delivery retry policy — exponential backoff with these bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Per-channel max-text-chars overrides, keyed by channel id. A channel
/// plugin's own default applies when no override is present here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelLimitsConfig {
    #[serde(flatten)]
    pub overrides: HashMap<String, usize>,
}

impl ChannelLimitsConfig {
    pub fn limit_for(&self, channel_id: &str) -> Option<usize> {
        self.overrides.get(channel_id).copied()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_agent_model() -> String {
    "default".to_string()
}
fn default_allowed_models() -> Vec<String> {
    vec!["default".to_string()]
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_queue_max() -> usize {
    DEFAULT_QUEUE_MAX
}
fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}
fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}
fn default_retry_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}

impl GatewayConfig {
    /// Load config from a TOML file with `GATEWAY_*` env var overrides.
    ///
    /// `config_path` defaults to `<state-dir>/gateway.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let state_dir = resolve_state_dir();
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| format!("{}/gateway.toml", state_dir));

        let mut config: GatewayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("GATEWAY_").split("_"))
            .extract()
            .map_err(|e| crate::error::GatewayError::InvalidRequest(e.to_string()))?;

        if config.state_dir.is_none() {
            config.state_dir = Some(state_dir);
        }

        Ok(config)
    }

    pub fn state_dir(&self) -> &str {
        self.state_dir.as_deref().unwrap_or(".")
    }

    /// Whether a session may switch to `model`: either the agent's
    /// configured default or a name present in `allowed_models`.
    pub fn is_model_allowed(&self, model: &str) -> bool {
        model == self.agent_model || self.allowed_models.iter().any(|m| m == model)
    }
}

/// Resolves the state directory: explicit env var wins over the default.
///
/// `OPENCLAW_STATE_DIR` is canonical. `CLAWDBOT_STATE_DIR` is accepted for
/// one release as a deprecated alias and logs a one-time warning.
pub fn resolve_state_dir() -> String {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        return dir;
    }
    if let Ok(dir) = std::env::var(STATE_DIR_ENV_LEGACY) {
        tracing::warn!(
            "{} is deprecated, use {} instead",
            STATE_DIR_ENV_LEGACY,
            STATE_DIR_ENV
        );
        return dir;
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.openclaw", home)
}
