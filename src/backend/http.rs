// src/backend/http.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};

use crate::{
    backend::ExamBackend,
    error::BackendError,
    models::attempt::{
        AnswerMap, Attempt, AttemptId, GradedAttempt, SaveAnswersRequest, StartedAttempt,
        SubmitOutcome,
    },
};

/// `ExamBackend` over the backend's JSON REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Builds a client whose every request gives up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Network(format!("invalid backend url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Network(format!(
                "invalid backend url: {}",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Appends path segments to the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Maps non-success statuses onto `BackendError`.
fn check_status(response: Response) -> Result<Response, BackendError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(BackendError::NotFound),
        StatusCode::CONFLICT => Err(BackendError::AlreadySubmitted),
        status => Err(BackendError::Status(status.as_u16())),
    }
}

#[async_trait]
impl ExamBackend for HttpBackend {
    async fn start_attempt(&self, test_id: &str) -> Result<AttemptId, BackendError> {
        let url = self.endpoint(&["api", "tests", test_id, "attempts"]);
        let response = check_status(self.client.post(url).send().await?)?;
        let started: StartedAttempt = response.json().await?;
        Ok(started.attempt_id)
    }

    async fn load_attempt(&self, attempt_id: &AttemptId) -> Result<Attempt, BackendError> {
        let url = self.endpoint(&["api", "attempts", attempt_id.as_str()]);
        let response = check_status(self.client.get(url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn save_answers(
        &self,
        attempt_id: &AttemptId,
        answers: &AnswerMap,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "attempts", attempt_id.as_str(), "answers"]);
        let body = SaveAnswersRequest {
            answers: answers.clone(),
        };
        check_status(self.client.put(url).json(&body).send().await?)?;
        Ok(())
    }

    async fn submit(&self, attempt_id: &AttemptId) -> Result<SubmitOutcome, BackendError> {
        let url = self.endpoint(&["api", "attempts", attempt_id.as_str(), "submit"]);
        let response = check_status(self.client.post(url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn get_result(&self, attempt_id: &AttemptId) -> Result<GradedAttempt, BackendError> {
        let url = self.endpoint(&["api", "attempts", attempt_id.as_str(), "result"]);
        let response = check_status(self.client.get(url).send().await?)?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let backend = HttpBackend::new("http://exam.local/v1/", Duration::from_secs(1)).unwrap();
        let url = backend.endpoint(&["api", "attempts", "a b/c"]);
        assert_eq!(url.as_str(), "http://exam.local/v1/api/attempts/a%20b%2Fc");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpBackend::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpBackend::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }
}
