// src/session/autosave.rs

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};

use crate::session::SessionCore;

/// Spawns the periodic best-effort save of one session's answers.
///
/// The task never touches the buffer except to read it, and a failed save is
/// only logged: the local buffer stays the authority and the next tick (or
/// the final submission) sends it again.
pub(crate) fn spawn_autosave(
    core: Arc<SessionCore>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = ticker.tick() => save_once(&core).await,
            }
        }

        tracing::debug!(attempt_id = %core.attempt_id, "Autosave stopped");
    })
}

/// Sends the whole buffer if it changed since the last acknowledged save.
pub(crate) async fn save_once(core: &SessionCore) {
    let (revision, answers) = {
        let store = core.store.lock().await;
        if !store.phase.accepts_answers() || !store.has_unsaved_changes() {
            return;
        }
        (store.buffer.revision(), store.buffer.snapshot())
    };

    match core.backend.save_answers(&core.attempt_id, &answers).await {
        Ok(()) => {
            core.store.lock().await.mark_saved(revision);
            tracing::debug!(
                attempt_id = %core.attempt_id,
                answered = answers.len(),
                "Autosaved answers"
            );
        }
        Err(e) => {
            tracing::warn!(
                attempt_id = %core.attempt_id,
                "Autosave failed, keeping answers locally: {}",
                e
            );
        }
    }
}
