// src/session/mod.rs

//! The timed assessment engine.
//!
//! One [`ExamSession`] drives one attempt. The loader builds its store, the
//! timer and autosave tasks run beside it until the end-session signal fires,
//! and the coordinator moves it to a terminal phase exactly once.

pub mod autosave;
pub mod coordinator;
pub mod loader;
pub mod navigation;
pub mod registry;
pub mod store;
pub mod timer;

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use crate::{
    backend::ExamBackend,
    clock::AttemptClockStore,
    config::{Config, DEFAULT_AUTOSAVE_INTERVAL_SECS, TIMER_TICK},
    error::SessionError,
    models::{
        attempt::{AnswerMap, AttemptId},
        session::{NavigateRequest, SessionPhase, SessionView, SubmitReason, SubmitTicket},
    },
};

pub use loader::{LoadOutcome, load_session};
pub use registry::SessionRegistry;
pub use store::{AnswerBuffer, SessionStore};

/// Timing knobs shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub autosave_interval: Duration,
    pub tick: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            tick: TIMER_TICK,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            autosave_interval: config.autosave_interval(),
            tick: TIMER_TICK,
        }
    }
}

/// The timer and autosave tasks of one session.
pub(crate) struct BackgroundTasks {
    timer: JoinHandle<()>,
    autosave: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Waits for both tasks to finish; any in-flight autosave completes first.
    pub(crate) async fn join(self) {
        if let Err(e) = self.timer.await {
            tracing::error!("Timer task ended abnormally: {:?}", e);
        }
        if let Err(e) = self.autosave.await {
            tracing::error!("Autosave task ended abnormally: {:?}", e);
        }
    }
}

/// State shared between a session handle and its background tasks.
pub(crate) struct SessionCore {
    pub(crate) attempt_id: AttemptId,
    pub(crate) backend: Arc<dyn ExamBackend>,
    pub(crate) clocks: Arc<dyn AttemptClockStore>,
    pub(crate) store: Mutex<SessionStore>,
    pub(crate) tasks: Mutex<Option<BackgroundTasks>>,
    phase_tx: watch::Sender<SessionPhase>,
    remaining_tx: watch::Sender<u64>,
    stop_tx: watch::Sender<bool>,
}

impl SessionCore {
    /// Records a phase change and notifies subscribers.
    ///
    /// Callers hold the store lock, so a transition and the check that
    /// allowed it are one step.
    pub(crate) fn set_phase(&self, store: &mut SessionStore, phase: SessionPhase) {
        tracing::info!(
            attempt_id = %self.attempt_id,
            from = ?store.phase,
            to = ?phase,
            "Session phase changed"
        );
        store.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    pub(crate) fn publish_remaining(&self, seconds: u64) {
        self.remaining_tx.send_replace(seconds);
    }

    /// Fires the end-session signal. Safe to call any number of times.
    pub(crate) fn stop_background(&self) {
        self.stop_tx.send_replace(true);
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }
}

/// Handle to one live attempt. Cheap to clone; all clones share the store.
#[derive(Clone)]
pub struct ExamSession {
    core: Arc<SessionCore>,
}

impl ExamSession {
    /// Moves a freshly loaded store from `Loading` to `InProgress` and starts
    /// its timer and autosave tasks.
    pub(crate) async fn start(
        mut store: SessionStore,
        backend: Arc<dyn ExamBackend>,
        clocks: Arc<dyn AttemptClockStore>,
        remaining: Duration,
        settings: SessionSettings,
    ) -> Self {
        let attempt_id = store.attempt_id.clone();
        let remaining_secs = timer::ceil_secs(remaining);
        tracing::info!(
            attempt_id = %attempt_id,
            remaining_secs,
            answered = store.attempted_count(),
            "Session started"
        );
        store.phase = SessionPhase::InProgress;

        let (phase_tx, _) = watch::channel(store.phase.clone());
        let (remaining_tx, _) = watch::channel(remaining_secs);
        let (stop_tx, _) = watch::channel(false);

        let core = Arc::new(SessionCore {
            attempt_id,
            backend,
            clocks,
            store: Mutex::new(store),
            tasks: Mutex::new(None),
            phase_tx,
            remaining_tx,
            stop_tx,
        });

        // Held until both handles are stored, so a submission can never find
        // the slot empty while the tasks run.
        let mut tasks = core.tasks.lock().await;
        let timer = timer::spawn_timer(
            Arc::clone(&core),
            remaining,
            settings.tick,
            core.stop_signal(),
        );
        let autosave = autosave::spawn_autosave(
            Arc::clone(&core),
            settings.autosave_interval,
            core.stop_signal(),
        );
        *tasks = Some(BackgroundTasks { timer, autosave });
        drop(tasks);

        Self { core }
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.core.attempt_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.phase_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.core.phase_tx.subscribe()
    }

    pub fn remaining_seconds(&self) -> u64 {
        *self.core.remaining_tx.borrow()
    }

    /// Waits until the session leaves `InProgress`/`Submitting` and returns
    /// the phase it settled in.
    pub async fn settled(&self) -> SessionPhase {
        let mut phases = self.subscribe();
        let settled = phases
            .wait_for(|phase| {
                !matches!(
                    phase,
                    SessionPhase::Loading
                        | SessionPhase::InProgress
                        | SessionPhase::Submitting { .. }
                )
            })
            .await
            .map(|phase| phase.clone());
        settled.unwrap_or_else(|_| self.phase())
    }

    pub async fn view(&self) -> SessionView {
        let store = self.core.store.lock().await;
        SessionView {
            attempt_id: store.attempt_id.clone(),
            title: store.title.clone(),
            phase: store.phase.clone(),
            remaining_seconds: self.remaining_seconds(),
            current_index: store.current_index(),
            total_questions: store.questions.len() as u32,
            attempted_count: store.attempted_count(),
            question: store.public_question(),
            statuses: store.statuses(),
            outcome: store.outcome.clone(),
        }
    }

    /// Current answer mapping.
    pub async fn answers(&self) -> AnswerMap {
        self.core.store.lock().await.buffer.snapshot()
    }

    pub async fn attempted_count(&self) -> usize {
        self.core.store.lock().await.attempted_count()
    }

    pub async fn select_answer(&self, option_key: &str) -> Result<(), SessionError> {
        self.core.store.lock().await.select_answer(option_key)
    }

    pub async fn clear_answer(&self) -> Result<(), SessionError> {
        self.core.store.lock().await.clear_answer()
    }

    pub async fn toggle_flag(&self) -> Result<bool, SessionError> {
        self.core.store.lock().await.toggle_flag()
    }

    /// Applies a navigation request and returns the new index.
    pub async fn navigate(&self, request: NavigateRequest) -> Result<usize, SessionError> {
        let mut store = self.core.store.lock().await;
        match request {
            NavigateRequest::Next => Ok(store.next()),
            NavigateRequest::Previous => Ok(store.previous()),
            NavigateRequest::Jump { index } => store.jump(index),
        }
    }

    /// Manual submit. Without `confirmed` nothing changes and the caller gets
    /// the counts to show in the confirmation prompt.
    pub async fn request_submit(&self, confirmed: bool) -> SubmitTicket {
        if !confirmed {
            let store = self.core.store.lock().await;
            return match &store.phase {
                phase if phase.accepts_answers() || phase.is_retriable() => {
                    SubmitTicket::ConfirmationRequired {
                        attempted: store.attempted_count(),
                        unanswered: store.unanswered_count(),
                    }
                }
                phase => coordinator::ticket_for(phase),
            };
        }
        coordinator::begin_submission(&self.core, SubmitReason::Manual).await
    }

    /// Re-enters `Submitting` after a failed submission.
    pub async fn retry_submit(&self) -> Result<SubmitTicket, SessionError> {
        if !self.phase().is_retriable() {
            return Err(SessionError::NotRetriable);
        }
        Ok(coordinator::begin_submission(&self.core, SubmitReason::Retry).await)
    }

    /// Ends the session without submitting (the user navigated away).
    pub async fn close(&self) {
        tracing::info!(attempt_id = %self.core.attempt_id, "Closing session");
        self.core.stop_background();
    }
}
