// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::models::attempt::AttemptId;

/// Failures of the backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("attempt not found")]
    NotFound,

    #[error("attempt already submitted")]
    AlreadySubmitted,

    #[error("backend responded with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Failures of the attempt clock store.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("stored start time is not a valid timestamp: {0}")]
    Corrupt(String),
}

/// Why an attempt could not be entered.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("attempt is malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load attempt {attempt_id}: {source}")]
    Load {
        attempt_id: AttemptId,
        #[source]
        source: LoadError,
    },

    #[error("no active session for attempt {0}")]
    NoSession(AttemptId),

    #[error("answers can no longer be changed")]
    NotAcceptingAnswers,

    #[error("question {question_number} has no option '{key}'")]
    UnknownOption { question_number: u32, key: String },

    #[error("question index {index} is out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("session has no failed submission to retry")]
    NotRetriable,
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., answering after submission started)
    Conflict(String),

    // 502 Bad Gateway: the backend failed, the user may retry
    BadGateway(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, retriable) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    false,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, false),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, false),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, false),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg, true),
        };
        let body = Json(json!({
            "error": error_message,
            "retriable": retriable,
        }));

        (status, body).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Load { source, .. } => match source {
                LoadError::Backend(BackendError::NotFound) => {
                    AppError::NotFound("Attempt not found".to_string())
                }
                LoadError::Malformed(msg) => AppError::BadGateway(msg),
                LoadError::Clock(e) => AppError::InternalServerError(e.to_string()),
                LoadError::Backend(e) => AppError::BadGateway(e.to_string()),
            },
            SessionError::NoSession(id) => {
                AppError::NotFound(format!("No active session for attempt {}", id))
            }
            e @ (SessionError::NotAcceptingAnswers | SessionError::NotRetriable) => {
                AppError::Conflict(e.to_string())
            }
            e @ (SessionError::UnknownOption { .. } | SessionError::IndexOutOfRange { .. }) => {
                AppError::BadRequest(e.to_string())
            }
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => AppError::NotFound("Attempt not found".to_string()),
            BackendError::AlreadySubmitted => AppError::Conflict(err.to_string()),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}
