//! Shared error type across chatgw crates.

use thiserror::Error;

/// Client-facing error codes (stable API, see the design's error taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Body/query/params rejected.
    ValidationError,
    /// Token missing or invalid.
    Unauthorized,
    /// Tenant inactive or permission missing.
    Forbidden,
    /// Unknown tenant or sink.
    NotFound,
    /// Attempted to create an already-existing tenant.
    Conflict,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Message routes hit while the session isn't `connected`.
    NotConnected,
    /// Unhandled internal failure.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::ValidationError => "VALIDATION_ERROR",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Conflict => "CONFLICT",
            ClientCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ClientCode::NotConnected => "NOT_CONNECTED",
            ClientCode::Internal => "INTERNAL_ERROR",
        }
    }

    /// The HTTP status this code maps to.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::ValidationError => 400,
            ClientCode::Unauthorized => 401,
            ClientCode::Forbidden => 403,
            ClientCode::NotFound => 404,
            ClientCode::Conflict => 409,
            ClientCode::RateLimitExceeded => 429,
            ClientCode::NotConnected => 400,
            ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type used across the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rate limited")]
    RateLimited,
    #[error("session not connected")]
    NotConnected,
    #[error("internal: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            GatewayError::Validation(_) => ClientCode::ValidationError,
            GatewayError::Unauthorized => ClientCode::Unauthorized,
            GatewayError::Forbidden(_) => ClientCode::Forbidden,
            GatewayError::NotFound(_) => ClientCode::NotFound,
            GatewayError::Conflict(_) => ClientCode::Conflict,
            GatewayError::RateLimited => ClientCode::RateLimitExceeded,
            GatewayError::NotConnected => ClientCode::NotConnected,
            GatewayError::Internal(_) => ClientCode::Internal,
        }
    }
}
