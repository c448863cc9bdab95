//! Error types for the gateway

use thiserror::Error;

/// Gateway-wide error type
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Connection rejected at accept time; terminal for that attempt
    #[error("capacity exceeded: {current} of {max} connections in use")]
    CapacityExceeded { current: usize, max: usize },

    /// Command referenced an unknown connection id; client must reconnect
    #[error("invalid session: connection {0} is not registered")]
    InvalidSession(u64),

    /// Token bucket empty; transient, retry after refill
    #[error("rate limited")]
    RateLimited,

    /// Subscribe request contained no known topics
    #[error("no valid topics in subscribe request")]
    NoValidTopics,

    /// A single analytics dimension failed and was degraded to neutral
    #[error("analytics failure: {0}")]
    Analytics(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn analytics(msg: impl Into<String>) -> Self {
        GatewayError::Analytics(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        GatewayError::Internal(msg.into())
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
