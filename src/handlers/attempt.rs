// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    backend::ExamBackend,
    error::AppError,
    models::attempt::{AttemptId, StartedAttempt},
};

/// The "start test" action. Creates an attempt on the backend.
pub async fn start_attempt(
    State(backend): State<Arc<dyn ExamBackend>>,
    Path(test_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = backend.start_attempt(&test_id).await.map_err(|e| {
        tracing::error!("Failed to start attempt of test {}: {}", test_id, e);
        AppError::from(e)
    })?;

    tracing::info!(attempt_id = %attempt_id, test_id = %test_id, "Attempt created");
    Ok((StatusCode::CREATED, Json(StartedAttempt { attempt_id })))
}

/// Graded attempt for the results view.
pub async fn get_result(
    State(backend): State<Arc<dyn ExamBackend>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = backend.get_result(&AttemptId::from(attempt_id)).await?;
    Ok(Json(result))
}
