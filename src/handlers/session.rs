// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::AttemptId,
        session::{EnterResponse, NavigateRequest, SelectAnswerRequest, SubmitRequest, SubmitTicket},
    },
    session::{LoadOutcome, SessionRegistry},
};

/// Enters an attempt: loads it, or resumes the running session.
///
/// Already submitted attempts answer with `{"route":"results"}` instead of
/// a session view.
pub async fn enter(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = AttemptId::from(attempt_id);

    let response = match registry.enter(&attempt_id).await? {
        LoadOutcome::Started(session) => EnterResponse::Exam(session.view().await),
        LoadOutcome::AlreadySubmitted(attempt_id) => EnterResponse::Results { attempt_id },
    };

    Ok(Json(response))
}

/// Current session view.
pub async fn get_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(&attempt_id.into()).await?;
    Ok(Json(session.view().await))
}

/// Navigating away. Stops the timer and autosave and discards the session.
pub async fn leave(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    registry.remove(&attempt_id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Selects an option for the displayed question.
pub async fn select_answer(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = registry.get(&attempt_id.into()).await?;
    session.select_answer(&payload.option_key).await?;
    Ok(Json(session.view().await))
}

pub async fn clear_answer(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(&attempt_id.into()).await?;
    session.clear_answer().await?;
    Ok(Json(session.view().await))
}

/// Toggles the review flag of the displayed question.
pub async fn toggle_flag(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(&attempt_id.into()).await?;
    session.toggle_flag().await?;
    Ok(Json(session.view().await))
}

pub async fn navigate(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(&attempt_id.into()).await?;
    session.navigate(payload).await?;
    Ok(Json(session.view().await))
}

/// Manual submit.
///
/// Without `"confirmed": true` this only returns the confirmation prompt.
/// A request that starts the submission answers `202 Accepted`; poll the
/// session view for the outcome.
pub async fn submit(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
    payload: Option<Json<SubmitRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let confirmed = payload.is_some_and(|Json(request)| request.confirmed);
    let session = registry.get(&attempt_id.into()).await?;

    let ticket = session.request_submit(confirmed).await;
    Ok((ticket_status(&ticket), Json(ticket)))
}

/// Retries a failed submission with the preserved answers.
pub async fn retry(
    State(registry): State<Arc<SessionRegistry>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry.get(&attempt_id.into()).await?;
    let ticket = session.retry_submit().await?;
    Ok((ticket_status(&ticket), Json(ticket)))
}

fn ticket_status(ticket: &SubmitTicket) -> StatusCode {
    match ticket {
        SubmitTicket::Started => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    }
}
