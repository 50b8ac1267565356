use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("pairing request not found: {0}")]
    RequestNotFound(String),
    #[error("node not paired: {0}")]
    NodeNotFound(String),
    #[error("pairing request expired")]
    Expired,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PairingError> for gatewire_core::GatewayError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::RequestNotFound(msg) | PairingError::NodeNotFound(msg) => {
                gatewire_core::GatewayError::NotFound(msg)
            }
            PairingError::Expired => {
                gatewire_core::GatewayError::InvalidRequest("pairing request expired".into())
            }
            PairingError::Io(e) => gatewire_core::GatewayError::Permanent(e.to_string()),
            PairingError::Serialization(e) => gatewire_core::GatewayError::Permanent(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PairingError>;
