// src/session/coordinator.rs

//! Exactly-once submission.
//!
//! Every trigger (confirmed manual submit, timer expiry, manual retry) goes
//! through [`begin_submission`], whose check-and-set on the phase happens
//! under the store lock. Whoever finds the session in an enterable phase
//! wins; every other trigger gets a ticket describing why it was dropped.

use std::sync::Arc;

use crate::{
    error::BackendError,
    models::{
        attempt::{AnswerMap, SubmitOutcome},
        session::{SessionPhase, SubmitReason, SubmitTicket},
    },
    session::{BackgroundTasks, SessionCore},
};

/// Ticket for a trigger that cannot start a submission from `phase`.
pub(crate) fn ticket_for(phase: &SessionPhase) -> SubmitTicket {
    match phase {
        SessionPhase::Submitting { .. } => SubmitTicket::AlreadyInFlight,
        _ => SubmitTicket::AlreadyFinished,
    }
}

fn can_enter(phase: &SessionPhase, reason: SubmitReason) -> bool {
    match phase {
        SessionPhase::InProgress => true,
        // Expiry can never retry: the timer is stopped before the first attempt.
        SessionPhase::Error { .. } => reason != SubmitReason::Expired,
        _ => false,
    }
}

/// Moves the session into `Submitting` if nothing else got there first, then
/// runs the final save and submit in the background.
pub(crate) async fn begin_submission(core: &Arc<SessionCore>, reason: SubmitReason) -> SubmitTicket {
    let answers = {
        let mut store = core.store.lock().await;
        if !can_enter(&store.phase, reason) {
            tracing::debug!(
                attempt_id = %core.attempt_id,
                ?reason,
                phase = ?store.phase,
                "Ignoring submit trigger"
            );
            return ticket_for(&store.phase);
        }
        if reason == SubmitReason::Expired {
            store.expired = true;
        }
        core.set_phase(&mut store, SessionPhase::Submitting { reason });
        // No mutation is accepted from here on, so this is the final snapshot.
        store.buffer.snapshot()
    };

    core.stop_background();
    let tasks = core.tasks.lock().await.take();

    let core = Arc::clone(core);
    tokio::spawn(async move {
        run_submission(core, answers, tasks).await;
    });

    SubmitTicket::Started
}

async fn run_submission(core: Arc<SessionCore>, answers: AnswerMap, tasks: Option<BackgroundTasks>) {
    // An autosave already on the wire must land before the final save.
    if let Some(tasks) = tasks {
        tasks.join().await;
    }

    let result = save_then_submit(&core, &answers).await;

    let mut store = core.store.lock().await;
    match result {
        Ok(outcome) => {
            store.outcome = outcome;
            let revision = store.buffer.revision();
            store.mark_saved(revision);
            let phase = if store.expired {
                SessionPhase::Expired
            } else {
                SessionPhase::Submitted
            };
            core.set_phase(&mut store, phase);
            drop(store);

            if let Err(e) = core.clocks.clear(&core.attempt_id).await {
                tracing::warn!(
                    attempt_id = %core.attempt_id,
                    "Failed to clear attempt clock: {}",
                    e
                );
            }
        }
        Err(e) => {
            tracing::error!(
                attempt_id = %core.attempt_id,
                "Submission failed, answers kept for retry: {}",
                e
            );
            core.set_phase(
                &mut store,
                SessionPhase::Error {
                    message: format!("Submission failed: {}. Your answers are kept; please retry.", e),
                },
            );
        }
    }
}

/// Final save fully sequenced before submit.
///
/// `Ok(None)` means the backend already holds a submission for this attempt
/// (a retry after a lost response), which counts as success.
async fn save_then_submit(
    core: &SessionCore,
    answers: &AnswerMap,
) -> Result<Option<SubmitOutcome>, BackendError> {
    match core.backend.save_answers(&core.attempt_id, answers).await {
        Ok(()) => {}
        Err(BackendError::AlreadySubmitted) => return Ok(None),
        Err(e) => return Err(e),
    }

    match core.backend.submit(&core.attempt_id).await {
        Ok(outcome) => Ok(Some(outcome)),
        Err(BackendError::AlreadySubmitted) => Ok(None),
        Err(e) => Err(e),
    }
}
