// src/backend/memory.rs

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    backend::ExamBackend,
    error::BackendError,
    models::{
        attempt::{AnswerMap, Attempt, AttemptId, GradedAttempt, SubmitOutcome},
        question::{Question, QuestionOption},
    },
};

/// A test that attempts can be started from.
#[derive(Debug, Clone)]
pub struct ExamTemplate {
    pub title: String,
    pub duration_seconds: u64,
    pub questions: Vec<Question>,
    /// Correct option per question number.
    pub answer_key: BTreeMap<u32, String>,
}

impl ExamTemplate {
    /// `question_count` questions with options A-D; "A" is always correct.
    pub fn uniform(title: &str, question_count: u32, duration_seconds: u64) -> Self {
        let questions = (1..=question_count)
            .map(|number| Question {
                question_number: number,
                text: format!("Question {}", number),
                options: ["A", "B", "C", "D"]
                    .iter()
                    .map(|key| QuestionOption {
                        key: key.to_string(),
                        text: format!("Option {}", key),
                    })
                    .collect(),
                correct_answer: None,
                user_answer: None,
            })
            .collect();
        let answer_key = (1..=question_count)
            .map(|number| (number, "A".to_string()))
            .collect();

        Self {
            title: title.to_string(),
            duration_seconds,
            questions,
            answer_key,
        }
    }
}

#[derive(Debug)]
struct StoredAttempt {
    template: ExamTemplate,
    started_at: Option<chrono::DateTime<Utc>>,
    answers: AnswerMap,
    outcome: Option<SubmitOutcome>,
    /// Answers as they stood when `submit` graded them.
    graded_answers: Option<AnswerMap>,
}

#[derive(Debug, Default)]
struct Inner {
    tests: HashMap<String, ExamTemplate>,
    attempts: HashMap<AttemptId, StoredAttempt>,
    saves: Vec<(AttemptId, AnswerMap)>,
    submit_calls: usize,
    load_failure: Option<BackendError>,
    save_failure: Option<BackendError>,
    submit_failures: VecDeque<BackendError>,
    lose_next_submit_response: bool,
    save_delay: Duration,
    submit_delay: Duration,
}

/// Simple in-memory backend for tests and local development.
///
/// Grades by exact match against the template's answer key and records every
/// save and submit call so callers can inspect what reached the "server".
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, BackendError> {
        self.inner
            .lock()
            .map_err(|e| BackendError::Network(e.to_string()))
    }

    pub fn insert_test(&self, test_id: &str, template: ExamTemplate) {
        if let Ok(mut inner) = self.lock() {
            inner.tests.insert(test_id.to_string(), template);
        }
    }

    /// Registers an attempt directly, bypassing `start_attempt`.
    pub fn insert_attempt(&self, attempt_id: &AttemptId, template: ExamTemplate) {
        if let Ok(mut inner) = self.lock() {
            inner.attempts.insert(
                attempt_id.clone(),
                StoredAttempt {
                    template,
                    started_at: None,
                    answers: AnswerMap::new(),
                    outcome: None,
                    graded_answers: None,
                },
            );
        }
    }

    /// Pretends the backend records start times itself.
    pub fn set_started_at(&self, attempt_id: &AttemptId, started_at: chrono::DateTime<Utc>) {
        if let Ok(mut inner) = self.lock() {
            if let Some(stored) = inner.attempts.get_mut(attempt_id) {
                stored.started_at = Some(started_at);
            }
        }
    }

    /// Stores answers as if an earlier visit had saved them.
    pub fn preload_answers(&self, attempt_id: &AttemptId, answers: AnswerMap) {
        if let Ok(mut inner) = self.lock() {
            if let Some(stored) = inner.attempts.get_mut(attempt_id) {
                stored.answers = answers;
            }
        }
    }

    pub fn fail_loads(&self, error: Option<BackendError>) {
        if let Ok(mut inner) = self.lock() {
            inner.load_failure = error;
        }
    }

    pub fn fail_saves(&self, error: Option<BackendError>) {
        if let Ok(mut inner) = self.lock() {
            inner.save_failure = error;
        }
    }

    /// The next submit call fails with `error`; queued failures are used in order.
    pub fn fail_next_submit(&self, error: BackendError) {
        if let Ok(mut inner) = self.lock() {
            inner.submit_failures.push_back(error);
        }
    }

    /// The next submit is graded but its response never arrives.
    pub fn lose_next_submit_response(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.lose_next_submit_response = true;
        }
    }

    pub fn set_save_delay(&self, delay: Duration) {
        if let Ok(mut inner) = self.lock() {
            inner.save_delay = delay;
        }
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        if let Ok(mut inner) = self.lock() {
            inner.submit_delay = delay;
        }
    }

    /// Every mapping that reached `save_answers`, in arrival order.
    pub fn saves(&self) -> Vec<(AttemptId, AnswerMap)> {
        self.lock().map(|inner| inner.saves.clone()).unwrap_or_default()
    }

    pub fn submit_calls(&self) -> usize {
        self.lock().map(|inner| inner.submit_calls).unwrap_or_default()
    }

    /// Answers currently stored for `attempt_id`.
    pub fn stored_answers(&self, attempt_id: &AttemptId) -> Option<AnswerMap> {
        let inner = self.lock().ok()?;
        inner.attempts.get(attempt_id).map(|stored| stored.answers.clone())
    }

    /// Answers the attempt was graded with, once submitted.
    pub fn graded_answers(&self, attempt_id: &AttemptId) -> Option<AnswerMap> {
        let inner = self.lock().ok()?;
        inner
            .attempts
            .get(attempt_id)
            .and_then(|stored| stored.graded_answers.clone())
    }

    pub fn attempt_ids(&self) -> Vec<AttemptId> {
        self.lock()
            .map(|inner| inner.attempts.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn grade(template: &ExamTemplate, answers: &AnswerMap) -> SubmitOutcome {
    let correct_count = answers
        .iter()
        .filter(|(number, key)| template.answer_key.get(*number) == Some(*key))
        .count() as u32;
    let wrong_count = answers.len() as u32 - correct_count;

    SubmitOutcome {
        score: i64::from(correct_count) * 10,
        correct_count,
        wrong_count,
    }
}

fn present(attempt_id: &AttemptId, stored: &StoredAttempt) -> Attempt {
    let submitted = stored.outcome.is_some();
    let questions = stored
        .template
        .questions
        .iter()
        .map(|question| Question {
            user_answer: stored.answers.get(&question.question_number).cloned(),
            correct_answer: if submitted {
                stored
                    .template
                    .answer_key
                    .get(&question.question_number)
                    .cloned()
            } else {
                None
            },
            ..question.clone()
        })
        .collect::<Vec<_>>();

    Attempt {
        attempt_id: attempt_id.clone(),
        title: Some(stored.template.title.clone()),
        duration_seconds: stored.template.duration_seconds,
        total_questions: questions.len() as u32,
        is_submitted: submitted,
        started_at: stored.started_at,
        questions,
    }
}

#[async_trait]
impl ExamBackend for InMemoryBackend {
    async fn start_attempt(&self, test_id: &str) -> Result<AttemptId, BackendError> {
        let template = self
            .lock()?
            .tests
            .get(test_id)
            .cloned()
            .ok_or(BackendError::NotFound)?;
        let attempt_id = AttemptId::new(uuid::Uuid::new_v4().to_string());
        self.insert_attempt(&attempt_id, template);
        Ok(attempt_id)
    }

    async fn load_attempt(&self, attempt_id: &AttemptId) -> Result<Attempt, BackendError> {
        let inner = self.lock()?;
        if let Some(error) = inner.load_failure.clone() {
            return Err(error);
        }
        inner
            .attempts
            .get(attempt_id)
            .map(|stored| present(attempt_id, stored))
            .ok_or(BackendError::NotFound)
    }

    async fn save_answers(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> Result<(), BackendError> {
        let delay = self.lock()?.save_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock()?;
        if let Some(error) = inner.save_failure.clone() {
            return Err(error);
        }
        inner.saves.push((attempt_id.clone(), answers.clone()));
        let stored = inner
            .attempts
            .get_mut(attempt_id)
            .ok_or(BackendError::NotFound)?;
        if stored.outcome.is_some() {
            return Err(BackendError::AlreadySubmitted);
        }
        stored.answers = answers.clone();
        Ok(())
    }

    async fn submit(&self, attempt_id: &AttemptId) -> Result<SubmitOutcome, BackendError> {
        let delay = {
            let mut inner = self.lock()?;
            inner.submit_calls += 1;
            inner.submit_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock()?;
        if let Some(error) = inner.submit_failures.pop_front() {
            return Err(error);
        }
        let lose_response = std::mem::take(&mut inner.lose_next_submit_response);
        let stored = inner
            .attempts
            .get_mut(attempt_id)
            .ok_or(BackendError::NotFound)?;
        if stored.outcome.is_some() {
            return Err(BackendError::AlreadySubmitted);
        }

        let outcome = grade(&stored.template, &stored.answers);
        stored.outcome = Some(outcome.clone());
        stored.graded_answers = Some(stored.answers.clone());

        if lose_response {
            return Err(BackendError::Network("connection reset".to_string()));
        }
        Ok(outcome)
    }

    async fn get_result(&self, attempt_id: &AttemptId) -> Result<GradedAttempt, BackendError> {
        let inner = self.lock()?;
        let stored = inner
            .attempts
            .get(attempt_id)
            .ok_or(BackendError::NotFound)?;
        let outcome = stored.outcome.clone().ok_or(BackendError::NotFound)?;
        let attempt = present(attempt_id, stored);

        Ok(GradedAttempt {
            attempt_id: attempt.attempt_id,
            score: outcome.score,
            correct_count: outcome.correct_count,
            wrong_count: outcome.wrong_count,
            total_questions: attempt.total_questions,
            submitted_at: Some(Utc::now()),
            questions: attempt.questions,
        })
    }
}
