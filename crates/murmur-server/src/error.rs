use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use murmur_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Validation failure: missing fields, malformed access key,
    /// inadmissible text. Rejected before any state change.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A referenced whisper or reply does not exist (or is not visible to
    /// the caller, which must look the same).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller lacks the required capability. Deliberately generic.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("record not found".to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Internal(_) => {
                // Internal detail stays in the logs, not in the response.
                tracing::error!(error = %self, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ServerError = StoreError::NotFound.into();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[test]
    fn other_store_errors_map_to_internal() {
        let err: ServerError = StoreError::Migration("boom".into()).into();
        assert!(matches!(err, ServerError::Internal(_)));
    }
}
