//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store rejected or failed a write
    #[error("Backing store error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be encoded for storage
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The caller-supplied fallback failed
    #[error("Fallback failed: {0}")]
    Fallback(#[source] anyhow::Error),

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Unknown category or bad configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::Config(_) => StatusCode::NOT_FOUND,
            CacheError::Codec(_) | CacheError::Fallback(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let test_cases = vec![
            (
                CacheError::Store(StoreError::Closed),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::InvalidKey("".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::Config("nope".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                CacheError::Fallback(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected_status);
        }
    }

    #[test]
    fn test_store_error_message_is_kept() {
        let err = CacheError::from(StoreError::Timeout(250));
        assert_eq!(
            err.to_string(),
            "Backing store error: Backing store timed out after 250ms"
        );
    }
}
