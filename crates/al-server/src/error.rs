//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`al_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub al_core::Error);

impl From<al_core::Error> for AppError {
    fn from(e: al_core::Error) -> Self {
        Self(e)
    }
}

impl AppError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match &self.0 {
            al_core::Error::InvalidFingerprint(_) => "invalid_fingerprint",
            al_core::Error::PathRejected(_) => "path_rejected",
            al_core::Error::Validation(_) => "validation_error",
            al_core::Error::NotFound { .. } => "not_found",
            al_core::Error::Tool { .. } => "tool_error",
            al_core::Error::Unavailable(_) => "unavailable",
            al_core::Error::Io { .. } => "io_error",
            al_core::Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.0,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let response = AppError(al_core::Error::not_found("segment", "abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_fingerprint_produces_400() {
        let err = AppError(al_core::Error::InvalidFingerprint("xyz".into()));
        assert_eq!(err.code(), "invalid_fingerprint");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn spawn_failure_produces_502() {
        let response = AppError(al_core::Error::tool("ffmpeg", "not found")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn shutting_down_produces_503() {
        let response = AppError(al_core::Error::Unavailable("closing".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
