//! Error types for SupportDesk

use thiserror::Error;

/// Result type alias for SupportDesk operations
pub type Result<T> = std::result::Result<T, DeskError>;

/// Main error type for SupportDesk
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate document (existing_id={existing_id}): {message}")]
    Duplicate { existing_id: String, message: String },

    #[error("Permission denied: {0}")]
    Unauthorized(String),

    #[error("Tenant '{0}' is inactive")]
    TenantInactive(String),

    /// Carries the milliseconds left until the next call is allowed
    #[error("Rate limited. Please retry shortly.")]
    RateLimited(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeskError {
    /// Shorthand for a missing record
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DeskError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeskError::Http(_) | DeskError::Llm(_) | DeskError::RateLimited(_)
        )
    }

    /// Get error code for the JSON-RPC surface
    pub fn code(&self) -> i64 {
        match self {
            DeskError::NotFound { .. } => -32001,
            DeskError::InvalidInput(_) => -32602,
            DeskError::Unauthorized(_) | DeskError::TenantInactive(_) => -32003,
            DeskError::RateLimited(_) => -32004,
            DeskError::Conflict(_) => -32005,
            DeskError::Duplicate { .. } => -32006,
            _ => -32000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DeskError::not_found("Ticket", "t1").code(), -32001);
        assert_eq!(DeskError::InvalidInput("x".into()).code(), -32602);
        assert_eq!(DeskError::TenantInactive("acme".into()).code(), -32003);
        assert_eq!(DeskError::Internal("boom".into()).code(), -32000);
    }

    #[test]
    fn test_not_found_message() {
        let err = DeskError::not_found("Session", "abc");
        assert_eq!(err.to_string(), "Session not found: abc");
    }

    #[test]
    fn test_retryable() {
        assert!(DeskError::RateLimited(500).is_retryable());
        assert!(DeskError::Llm("timeout".into()).is_retryable());
        assert!(!DeskError::Conflict("exists".into()).is_retryable());
    }
}
