// src/models/question.rs

use serde::{Deserialize, Serialize};

/// One selectable choice of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    /// Key unique within the question (e.g. "A").
    pub key: String,

    /// Display text of the option.
    #[serde(default)]
    pub text: String,
}

/// A question as delivered by the backend for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// 1-based, unique within the attempt. Answers are keyed by this,
    /// never by the position in `questions`.
    pub question_number: u32,

    /// The text content of the question.
    #[serde(default)]
    pub text: String,

    pub options: Vec<QuestionOption>,

    /// Only present once the attempt has been submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,

    /// Answer saved by an earlier visit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
}

impl Question {
    /// Whether `key` is one of this question's option keys.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|option| option.key == key)
    }
}

/// DTO for sending a question to the client (never carries the answer key).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub question_number: u32,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub selected: Option<String>,
    pub flagged: bool,
}
