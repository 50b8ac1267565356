use thiserror::Error;

/// Channel-independent error taxonomy shared by every component.
///
/// Each variant maps to exactly one wire error code via [`GatewayError::code`],
/// which `gatewire-gateway` copies verbatim into `response.error.code`. Internal
/// detail (stack traces, provider payloads) is logged, never serialized back to
/// a caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("throttled: retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("permanent error: {0}")]
    Permanent(String),

    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Stable wire code, see spec §7's error-kind taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
            GatewayError::Unauthorized(_) => "UNAUTHORIZED",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Conflict(_) => "CONFLICT",
            GatewayError::Unavailable(_) => "UNAVAILABLE",
            GatewayError::Throttled { .. } => "THROTTLED",
            GatewayError::Transient(_) => "TRANSIENT",
            GatewayError::Permanent(_) => "PERMANENT",
            GatewayError::Timeout { .. } => "TIMEOUT",
            GatewayError::Cancelled => "CANCELLED",
            GatewayError::Serialization(_) => "INVALID_REQUEST",
            GatewayError::Io(_) => "UNAVAILABLE",
        }
    }

    /// Whether a dispatcher/invoker should retry this kind automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_)
                | GatewayError::Throttled { .. }
                | GatewayError::Transient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(GatewayError::InvalidRequest("x".into()).code(), "INVALID_REQUEST");
        assert_eq!(GatewayError::Unauthorized("x".into()).code(), "UNAUTHORIZED");
        assert_eq!(GatewayError::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn retryable_kinds() {
        assert!(GatewayError::Unavailable("x".into()).is_retryable());
        assert!(GatewayError::Throttled { retry_after_ms: 10 }.is_retryable());
        assert!(GatewayError::Transient("x".into()).is_retryable());
        assert!(!GatewayError::Permanent("x".into()).is_retryable());
        assert!(!GatewayError::InvalidRequest("x".into()).is_retryable());
    }
}
