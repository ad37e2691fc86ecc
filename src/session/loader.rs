// src/session/loader.rs

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    backend::ExamBackend,
    clock::AttemptClockStore,
    error::{LoadError, SessionError},
    models::attempt::{Attempt, AttemptId},
    session::{ExamSession, SessionSettings, SessionStore},
};

/// Result of entering an attempt.
pub enum LoadOutcome {
    /// The attempt is open; its timer and autosave are running.
    Started(ExamSession),
    /// The attempt was submitted before. Nothing was started; show results.
    AlreadySubmitted(AttemptId),
}

/// Fetches an attempt and either starts a session for it or reports that it
/// is already submitted.
///
/// On failure nothing is started and nothing is left behind.
pub async fn load_session(
    attempt_id: &AttemptId,
    backend: Arc<dyn ExamBackend>,
    clocks: Arc<dyn AttemptClockStore>,
    settings: SessionSettings,
) -> Result<LoadOutcome, SessionError> {
    let load_error = |source: LoadError| SessionError::Load {
        attempt_id: attempt_id.clone(),
        source,
    };

    let attempt = backend
        .load_attempt(attempt_id)
        .await
        .map_err(|e| load_error(e.into()))?;

    if attempt.is_submitted {
        tracing::info!(attempt_id = %attempt_id, "Attempt already submitted, routing to results");
        return Ok(LoadOutcome::AlreadySubmitted(attempt.attempt_id));
    }

    validate_attempt(attempt_id, &attempt).map_err(|msg| load_error(LoadError::Malformed(msg)))?;

    let now = Utc::now();
    let started_at = match attempt.started_at {
        Some(started_at) => started_at,
        None => clocks
            .start_or_resume(attempt_id, now)
            .await
            .map_err(|e| load_error(e.into()))?,
    };
    let remaining = remaining_budget(attempt.duration_seconds, started_at, now);
    if started_at < now {
        tracing::info!(
            attempt_id = %attempt_id,
            started_at = %started_at,
            "Resuming attempt"
        );
    }

    let store = SessionStore::from_attempt(attempt);
    let session = ExamSession::start(store, backend, clocks, remaining, settings).await;
    Ok(LoadOutcome::Started(session))
}

/// Time left of a `duration_seconds` budget that started at `started_at`.
///
/// A start recorded in the future counts as no time elapsed.
pub fn remaining_budget(duration_seconds: u64, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let elapsed = (now - started_at).to_std().unwrap_or(Duration::ZERO);
    Duration::from_secs(duration_seconds).saturating_sub(elapsed)
}

fn validate_attempt(requested: &AttemptId, attempt: &Attempt) -> Result<(), String> {
    if &attempt.attempt_id != requested {
        return Err(format!(
            "requested attempt {} but received {}",
            requested, attempt.attempt_id
        ));
    }
    if attempt.questions.is_empty() {
        return Err("attempt has no questions".to_string());
    }
    if attempt.total_questions as usize != attempt.questions.len() {
        return Err(format!(
            "totalQuestions is {} but {} questions were sent",
            attempt.total_questions,
            attempt.questions.len()
        ));
    }

    let mut numbers = HashSet::new();
    for question in &attempt.questions {
        if question.question_number == 0 {
            return Err("question numbers start at 1".to_string());
        }
        if !numbers.insert(question.question_number) {
            return Err(format!("question {} appears twice", question.question_number));
        }

        let mut keys = HashSet::new();
        if let Some(dup) = question.options.iter().find(|o| !keys.insert(o.key.as_str())) {
            return Err(format!(
                "question {} repeats option '{}'",
                question.question_number, dup.key
            ));
        }
    }

    Ok(())
}
