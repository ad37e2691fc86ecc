// src/backend/mod.rs

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::{
    error::BackendError,
    models::attempt::{AnswerMap, Attempt, AttemptId, GradedAttempt, SubmitOutcome},
};

pub use http::HttpBackend;
pub use memory::{ExamTemplate, InMemoryBackend};

/// The REST backend that owns attempts, grading and results.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// Creates an attempt of `test_id` for the current user.
    async fn start_attempt(&self, test_id: &str) -> Result<AttemptId, BackendError>;

    /// Fetches an attempt. Unsubmitted attempts come without answer keys.
    ///
    /// Returns `BackendError::NotFound` for unknown ids.
    async fn load_attempt(&self, attempt_id: &AttemptId) -> Result<Attempt, BackendError>;

    /// Stores the full answer mapping. Sending the same mapping twice has no
    /// further effect.
    async fn save_answers(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> Result<(), BackendError>;

    /// Grades the stored answers.
    ///
    /// Returns `BackendError::AlreadySubmitted` if the attempt was submitted before.
    async fn submit(&self, attempt_id: &AttemptId) -> Result<SubmitOutcome, BackendError>;

    /// Fetches the graded attempt for the results view.
    async fn get_result(&self, attempt_id: &AttemptId) -> Result<GradedAttempt, BackendError>;
}
