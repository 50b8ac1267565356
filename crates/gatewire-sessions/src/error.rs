use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {key}")]
    NotFound { key: String },

    /// Expected format: `agent:<agentId>:...`
    #[error("invalid session key: {0}")]
    InvalidKey(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("label already in use: {0}")]
    LabelTaken(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for gatewire_core::GatewayError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound { key } => gatewire_core::GatewayError::NotFound(key),
            SessionError::InvalidKey(s) => gatewire_core::GatewayError::InvalidRequest(s),
            SessionError::Validation(s) => gatewire_core::GatewayError::InvalidRequest(s),
            SessionError::LabelTaken(s) => {
                gatewire_core::GatewayError::Conflict(format!("label already in use: {s}"))
            }
            SessionError::Io(e) => gatewire_core::GatewayError::Unavailable(e.to_string()),
            SessionError::Serialization(e) => gatewire_core::GatewayError::InvalidRequest(e.to_string()),
        }
    }
}
