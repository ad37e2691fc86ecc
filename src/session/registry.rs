// src/session/registry.rs

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{RwLock, watch};

use crate::{
    backend::ExamBackend,
    clock::AttemptClockStore,
    error::SessionError,
    models::{attempt::AttemptId, session::SessionPhase},
    session::{ExamSession, LoadOutcome, SessionSettings, load_session},
};

type Sessions = Arc<RwLock<HashMap<AttemptId, ExamSession>>>;

/// Live sessions keyed by attempt.
///
/// Entering an attempt that already has a running session hands back that
/// session, so one attempt never gets two timers. A session is dropped as soon
/// as its submission succeeds; its results stay reachable through the backend.
/// A failed submission keeps its session so it can be retried.
pub struct SessionRegistry {
    sessions: Sessions,
    backend: Arc<dyn ExamBackend>,
    clocks: Arc<dyn AttemptClockStore>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        backend: Arc<dyn ExamBackend>,
        clocks: Arc<dyn AttemptClockStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            clocks,
            settings,
        }
    }

    /// Loads or resumes `attempt_id`.
    ///
    /// A session that is still in progress, submitting or waiting for a retry
    /// is reused. A finished one is dropped and the attempt is loaded again,
    /// which routes it to results.
    pub async fn enter(&self, attempt_id: &AttemptId) -> Result<LoadOutcome, SessionError> {
        if let Some(existing) = self.live(attempt_id).await {
            tracing::debug!(attempt_id = %attempt_id, "Reusing live session");
            return Ok(LoadOutcome::Started(existing));
        }

        let outcome = load_session(
            attempt_id,
            Arc::clone(&self.backend),
            Arc::clone(&self.clocks),
            self.settings,
        )
        .await?;

        let mut sessions = self.sessions.write().await;
        match outcome {
            LoadOutcome::Started(session) => {
                // Another request may have loaded the same attempt meanwhile.
                if let Some(existing) = sessions.get(attempt_id) {
                    if !existing.phase().is_finished() {
                        session.close().await;
                        return Ok(LoadOutcome::Started(existing.clone()));
                    }
                }
                sessions.insert(attempt_id.clone(), session.clone());
                self.evict_when_finished(attempt_id.clone(), session.subscribe());
                Ok(LoadOutcome::Started(session))
            }
            LoadOutcome::AlreadySubmitted(id) => {
                sessions.remove(attempt_id);
                Ok(LoadOutcome::AlreadySubmitted(id))
            }
        }
    }

    pub async fn get(&self, attempt_id: &AttemptId) -> Result<ExamSession, SessionError> {
        self.sessions
            .read()
            .await
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| SessionError::NoSession(attempt_id.clone()))
    }

    /// Navigating away: stops the session's tasks and forgets it.
    ///
    /// A submission already in flight still runs to completion.
    pub async fn remove(&self, attempt_id: &AttemptId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(attempt_id)
            .ok_or_else(|| SessionError::NoSession(attempt_id.clone()))?;
        session.close().await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn live(&self, attempt_id: &AttemptId) -> Option<ExamSession> {
        self.sessions
            .read()
            .await
            .get(attempt_id)
            .filter(|session| !session.phase().is_finished())
            .cloned()
    }

    /// Drops the session of `attempt_id` once it reaches `Submitted` or
    /// `Expired`. Ends without touching the map if the session is closed first.
    fn evict_when_finished(&self, attempt_id: AttemptId, mut phases: watch::Receiver<SessionPhase>) {
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            if phases.wait_for(SessionPhase::is_finished).await.is_err() {
                return;
            }
            drop(phases);

            let mut sessions = sessions.write().await;
            // The slot may hold a newer session by now.
            if sessions
                .get(&attempt_id)
                .is_some_and(|session| session.phase().is_finished())
            {
                sessions.remove(&attempt_id);
                tracing::debug!(attempt_id = %attempt_id, "Evicted finished session");
            }
        });
    }
}
