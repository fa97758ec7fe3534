use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors that are allowed to reach a caller. Every other failure (LLM,
/// search, malformed output) is absorbed into a fallback value plus an
/// `ERROR` event and never shows up here.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid session config: {0}")]
    Config(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Unknown agent: {0}")]
    AgentNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Config(msg) => (StatusCode::BAD_REQUEST, "CONFIG_ERROR", msg.clone()),
            AppError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("Session {id} not found"),
            ),
            AppError::AgentNotFound(name) => (
                StatusCode::NOT_FOUND,
                "AGENT_NOT_FOUND",
                format!("No agent named '{name}'"),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
