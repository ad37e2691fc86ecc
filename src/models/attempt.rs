// src/models/attempt.rs

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// Opaque identifier of one user's instance of one test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(String);

impl AttemptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AttemptId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AttemptId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Answer mapping as sent over the wire: question number to option key.
pub type AnswerMap = BTreeMap<u32, String>;

/// An attempt as returned by the backend's load operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub attempt_id: AttemptId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Fixed at creation.
    pub duration_seconds: u64,

    pub total_questions: u32,

    /// Monotonic: once true, never false again.
    pub is_submitted: bool,

    /// Server-recorded start time, when the backend tracks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Exam order.
    pub questions: Vec<Question>,
}

/// DTO returned by the "start test" action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAttempt {
    pub attempt_id: AttemptId,
}

/// DTO for the save operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: AnswerMap,
}

/// Score summary returned by the submit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub score: i64,
    pub correct_count: u32,
    pub wrong_count: u32,
}

/// Full graded attempt, consumed by the results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAttempt {
    pub attempt_id: AttemptId,
    pub score: i64,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub total_questions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Questions with `correct_answer` and `user_answer` filled in.
    pub questions: Vec<Question>,
}
