//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use miliare_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ServerError::Core(CoreError::not_found(kind, id))
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ServerError::Core(CoreError::forbidden(reason))
    }

    /// HTTP status and machine-readable reason
    pub fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Core(err) => {
                let status = match err {
                    CoreError::Unauthenticated | CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
                    CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CoreError::InvalidTransition { .. }
                    | CoreError::CompanyInactive(_)
                    | CoreError::NotPayable { .. }
                    | CoreError::PaymentAlreadyProcessed(_)
                    | CoreError::Conflict { .. } => StatusCode::CONFLICT,
                    CoreError::MissingAmount
                    | CoreError::InvalidCompensation(_)
                    | CoreError::Validation(_)
                    | CoreError::Json(_) => StatusCode::BAD_REQUEST,
                    CoreError::IdentityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.code())
            }
            ServerError::EmailAlreadyExists => (StatusCode::CONFLICT, "email_exists"),
            ServerError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "invalid_status"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        ServerError::Internal(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, reason) = self.status_and_reason();

        // Only caller-correctable details are echoed back
        let detail = match &self {
            ServerError::Core(CoreError::Validation(msg))
            | ServerError::Core(CoreError::InvalidCompensation(msg)) => Some(msg.clone()),
            ServerError::Core(CoreError::IdentityUnavailable(msg)) => {
                tracing::error!("Identity provider unavailable: {}", msg);
                None
            }
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                None
            }
            _ => None,
        };

        let body = match detail {
            Some(detail) => json!({ "success": false, "reason": reason, "detail": detail }),
            None => json!({ "success": false, "reason": reason }),
        };
        (status, axum::Json(body)).into_response()
    }
}
