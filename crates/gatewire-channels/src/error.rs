use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("target not recognized: {0}")]
    UnknownTarget(String),
}

impl From<ChannelError> for gatewire_core::GatewayError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::ConnectionFailed(s) => gatewire_core::GatewayError::Unavailable(s),
            ChannelError::SendFailed(s) => gatewire_core::GatewayError::Transient(s),
            ChannelError::AuthFailed(s) => gatewire_core::GatewayError::Unauthorized(s),
            ChannelError::Timeout { ms } => gatewire_core::GatewayError::Timeout { ms },
            ChannelError::ConfigError(s) => gatewire_core::GatewayError::InvalidRequest(s),
            ChannelError::UnknownTarget(s) => gatewire_core::GatewayError::NotFound(s),
        }
    }
}
