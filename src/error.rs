//! Error types for the request coordinator
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::storage::StorageError;

// == Coordinator Error Enum ==
/// Unified error type for the coordination components.
///
/// `Clone` so a single grouped failure can be delivered to every item of a
/// batch group, and a single deduplicated failure to every joined caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Malformed input, rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persisted store unreachable or holding a corrupt record
    #[error("Storage error: {0}")]
    Storage(String),

    /// The grouped remote call for a batch group failed
    #[error("Grouped operation failed for '{kind}': {message}")]
    GroupedOperation { kind: String, message: String },

    /// A batched item's own deadline passed before it was answered
    #[error("Request of kind '{kind}' timed out after {timeout_ms}ms")]
    ItemTimeout { kind: String, timeout_ms: u64 },

    /// Remote single-item query failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for CoordError {
    fn from(err: StorageError) -> Self {
        CoordError::Storage(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CoordError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordError::NotFound(_) => StatusCode::NOT_FOUND,
            CoordError::ItemTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoordError::GroupedOperation { .. } | CoordError::Remote(_) => StatusCode::BAD_GATEWAY,
            CoordError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoordError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the coordinator.
pub type Result<T> = std::result::Result<T, CoordError>;

/// Rejects empty keys before any storage or remote call is made.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoordError::Validation("Key cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("user:1").is_ok());
        assert!(matches!(validate_key(""), Err(CoordError::Validation(_))));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: CoordError = StorageError::Unavailable("backend down".to_string()).into();
        assert!(matches!(err, CoordError::Storage(ref msg) if msg.contains("backend down")));
    }

    #[test]
    fn test_status_codes() {
        let resp = CoordError::Validation("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CoordError::NotFound("k".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = CoordError::ItemTimeout {
            kind: "user_profile".into(),
            timeout_ms: 10,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
