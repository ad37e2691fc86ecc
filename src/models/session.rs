// src/models/session.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    attempt::{AttemptId, SubmitOutcome},
    question::PublicQuestion,
};

/// What started a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    /// The user confirmed a manual submit.
    Manual,
    /// The countdown reached zero.
    Expired,
    /// The user retried after a failed submission.
    Retry,
}

/// Lifecycle phase of one session.
///
/// `Submitted` and `Expired` are absorbing. `Error` is a failed submission;
/// it moves back to `Submitting` through a manual retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    InProgress,
    Submitting { reason: SubmitReason },
    Submitted,
    Expired,
    Error { message: String },
}

impl SessionPhase {
    /// Both outcomes of a successful submission. Nothing leaves these phases.
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionPhase::Submitted | SessionPhase::Expired)
    }

    pub fn accepts_answers(&self) -> bool {
        matches!(self, SessionPhase::InProgress)
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, SessionPhase::Error { .. })
    }
}

/// Answered state of one question in the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    Unanswered,
}

/// One entry of the question-by-question navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatus {
    pub index: usize,
    pub question_number: u32,
    pub status: AnswerStatus,
    pub flagged: bool,
    pub current: bool,
}

/// Snapshot of a session for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub attempt_id: AttemptId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub phase: SessionPhase,
    pub remaining_seconds: u64,
    pub current_index: usize,
    pub total_questions: u32,
    pub attempted_count: usize,
    pub question: Option<PublicQuestion>,
    pub statuses: Vec<QuestionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SubmitOutcome>,
}

/// Where the caller should go after entering an attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum EnterResponse {
    Exam(SessionView),
    #[serde(rename_all = "camelCase")]
    Results { attempt_id: AttemptId },
}

/// Answer to a submit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitTicket {
    /// Nothing happened; the user has to confirm first.
    #[serde(rename_all = "camelCase")]
    ConfirmationRequired { attempted: usize, unanswered: usize },
    /// This request moved the session into `Submitting`.
    Started,
    /// Another trigger is already submitting; this one was dropped.
    AlreadyInFlight,
    /// The session already ended.
    AlreadyFinished,
}

/// DTO for selecting an option on the displayed question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectAnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub option_key: String,
}

/// DTO for moving through the questions.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigateRequest {
    Next,
    Previous,
    Jump { index: usize },
}

/// DTO for a manual submit.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub confirmed: bool,
}
