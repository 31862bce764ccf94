//! Error types for the observer API.
//!
//! [`ObserverError`] converts into an Axum response with a small JSON body
//! via its [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested location is not registered.
    #[error("location not found: {id}")]
    LocationNotFound {
        /// The identifier from the request path.
        id: String,
    },
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::LocationNotFound { .. } => StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
