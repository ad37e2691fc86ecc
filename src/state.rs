// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{backend::ExamBackend, session::SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub backend: Arc<dyn ExamBackend>,
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ExamBackend> {
    fn from_ref(state: &AppState) -> Self {
        state.backend.clone()
    }
}
