// src/session/navigation.rs

use crate::{
    error::SessionError,
    models::{
        question::{PublicQuestion, Question},
        session::{AnswerStatus, QuestionStatus},
    },
    session::store::SessionStore,
};

/// Navigation and answering on the displayed question.
///
/// Moving and answering are independent: selecting an option never changes
/// `current_index`, and moving never touches the buffer.
impl SessionStore {
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Moves forward one question. No-op on the last question.
    pub fn next(&mut self) -> usize {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        self.current_index
    }

    /// Moves back one question. No-op on the first question.
    pub fn previous(&mut self) -> usize {
        self.current_index = self.current_index.saturating_sub(1);
        self.current_index
    }

    pub fn jump(&mut self, index: usize) -> Result<usize, SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.current_index = index;
        Ok(index)
    }

    /// Selects `key` for the displayed question.
    pub fn select_answer(&mut self, key: &str) -> Result<(), SessionError> {
        self.ensure_accepting_answers()?;
        let question = self.displayed_question()?;
        if !question.has_option(key) {
            return Err(SessionError::UnknownOption {
                question_number: question.question_number,
                key: key.to_owned(),
            });
        }
        let number = question.question_number;
        self.buffer.select(number, key);
        Ok(())
    }

    /// Returns the displayed question to unanswered.
    pub fn clear_answer(&mut self) -> Result<(), SessionError> {
        self.ensure_accepting_answers()?;
        let number = self.displayed_question()?.question_number;
        self.buffer.clear(number);
        Ok(())
    }

    /// Flips the review flag of the displayed question and returns the new state.
    pub fn toggle_flag(&mut self) -> Result<bool, SessionError> {
        self.ensure_accepting_answers()?;
        let number = self.displayed_question()?.question_number;
        if self.flags.remove(&number) {
            Ok(false)
        } else {
            self.flags.insert(number);
            Ok(true)
        }
    }

    pub fn attempted_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn unanswered_count(&self) -> usize {
        self.questions.len() - self.attempted_count()
    }

    /// Status of every question, in exam order.
    pub fn statuses(&self) -> Vec<QuestionStatus> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionStatus {
                index,
                question_number: question.question_number,
                status: if self.buffer.contains(question.question_number) {
                    AnswerStatus::Answered
                } else {
                    AnswerStatus::Unanswered
                },
                flagged: self.flags.contains(&question.question_number),
                current: index == self.current_index,
            })
            .collect()
    }

    pub fn public_question(&self) -> Option<PublicQuestion> {
        self.current_question().map(|question| PublicQuestion {
            question_number: question.question_number,
            text: question.text.clone(),
            options: question.options.clone(),
            selected: self.buffer.get(question.question_number).map(str::to_string),
            flagged: self.flags.contains(&question.question_number),
        })
    }

    fn ensure_accepting_answers(&self) -> Result<(), SessionError> {
        if self.phase.accepts_answers() {
            Ok(())
        } else {
            Err(SessionError::NotAcceptingAnswers)
        }
    }

    fn displayed_question(&self) -> Result<&Question, SessionError> {
        self.current_question()
            .ok_or(SessionError::IndexOutOfRange {
                index: self.current_index,
                len: self.questions.len(),
            })
    }
}
