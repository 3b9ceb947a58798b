//! Error types for warden-engine
//!
//! None of these are fatal. Every engine call site catches them, logs them
//! and carries on with the next independent step.

use thiserror::Error;

/// Failures reported by the platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Target does not exist (already deleted, member left...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The guard lacks permission for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The platform asked us to slow down
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success response
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request never completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
}

/// Notification delivery failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Result type alias for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::RateLimited {
            retry_after_ms: 1500,
        };
        assert!(err.to_string().contains("1500ms"));
        assert!(PlatformError::NotFound("role".into()).is_not_found());
        assert!(!PlatformError::Forbidden("role".into()).is_not_found());
    }
}
