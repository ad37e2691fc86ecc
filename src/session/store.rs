// src/session/store.rs

use std::collections::BTreeSet;

use crate::models::{
    attempt::{AnswerMap, Attempt, AttemptId, SubmitOutcome},
    question::Question,
    session::SessionPhase,
};

/// Selected option per question number.
///
/// A question missing from the map is unanswered. Every change bumps
/// `revision` so autosave can tell whether the server copy is stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerBuffer {
    answers: AnswerMap,
    revision: u64,
}

impl AnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` for `question_number`. Returns whether anything changed.
    pub fn select(&mut self, question_number: u32, key: &str) -> bool {
        if self.answers.get(&question_number).map(String::as_str) == Some(key) {
            return false;
        }
        self.answers.insert(question_number, key.to_owned());
        self.revision += 1;
        true
    }

    /// Marks `question_number` unanswered again.
    pub fn clear(&mut self, question_number: u32) -> bool {
        let removed = self.answers.remove(&question_number).is_some();
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn get(&self, question_number: u32) -> Option<&str> {
        self.answers.get(&question_number).map(String::as_str)
    }

    pub fn contains(&self, question_number: u32) -> bool {
        self.answers.contains_key(&question_number)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copy of the mapping for the wire.
    pub fn snapshot(&self) -> AnswerMap {
        self.answers.clone()
    }
}

/// In-memory state of one attempt while it is being taken.
#[derive(Debug)]
pub struct SessionStore {
    pub(crate) attempt_id: AttemptId,
    pub(crate) title: Option<String>,
    pub(crate) questions: Vec<Question>,
    pub(crate) buffer: AnswerBuffer,
    pub(crate) flags: BTreeSet<u32>,
    pub(crate) current_index: usize,
    pub(crate) phase: SessionPhase,
    /// Buffer revision last acknowledged by the backend.
    pub(crate) saved_revision: u64,
    /// Set once the countdown reached zero.
    pub(crate) expired: bool,
    pub(crate) outcome: Option<SubmitOutcome>,
}

impl SessionStore {
    /// Builds the store from a validated attempt, seeding the buffer from
    /// answers saved by an earlier visit.
    pub fn from_attempt(attempt: Attempt) -> Self {
        let mut buffer = AnswerBuffer::new();
        let mut questions = attempt.questions;

        for question in &mut questions {
            if question.correct_answer.take().is_some() {
                tracing::warn!(
                    attempt_id = %attempt.attempt_id,
                    question = question.question_number,
                    "Dropping answer key delivered before submission"
                );
            }

            if let Some(saved) = question.user_answer.as_deref() {
                if question.has_option(saved) {
                    buffer.select(question.question_number, saved);
                } else {
                    tracing::warn!(
                        attempt_id = %attempt.attempt_id,
                        question = question.question_number,
                        "Ignoring saved answer '{}' that is not an option",
                        saved
                    );
                }
            }
        }

        // The seeded answers already live on the server.
        let saved_revision = buffer.revision();

        Self {
            attempt_id: attempt.attempt_id,
            title: attempt.title,
            questions,
            buffer,
            flags: BTreeSet::new(),
            current_index: 0,
            phase: SessionPhase::Loading,
            saved_revision,
            expired: false,
            outcome: None,
        }
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt_id
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn buffer(&self) -> &AnswerBuffer {
        &self.buffer
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Whether the buffer holds edits the backend has not acknowledged.
    pub fn has_unsaved_changes(&self) -> bool {
        self.buffer.revision() != self.saved_revision
    }

    pub(crate) fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = self.saved_revision.max(revision);
    }
}
