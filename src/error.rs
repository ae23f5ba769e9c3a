use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Failures surfaced at the HTTP boundary.
///
/// A provider answer that does not parse is not an error: it is sent on as
/// a plain `text` event.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{provider} API key not configured")]
    MissingCredential { provider: &'static str },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider request failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("event channel failed: {0}")]
    Channel(String),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ChatError::MissingCredential { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": self.to_string() }),
            ),
            ChatError::InvalidRequest(details) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "invalid request", "details": details }),
            ),
            ChatError::Provider(e) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({ "error": "upstream request failed", "details": format!("{e:#}") }),
            ),
            ChatError::Channel(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "internal server error", "details": details }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
