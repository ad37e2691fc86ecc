// tests/api_tests.rs

use std::{sync::Arc, time::Duration};

use exam_session::{
    backend::{ExamTemplate, InMemoryBackend},
    clock::MemoryClockStore,
    config::Config,
    error::BackendError,
    routes,
    session::{SessionRegistry, SessionSettings},
    state::AppState,
};
use serde_json::Value;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the fake backend
/// behind it.
async fn spawn_app() -> (String, InMemoryBackend) {
    // 1. Fake backend with one test to start attempts from
    let backend = InMemoryBackend::new();
    backend.insert_test("mock-1", ExamTemplate::uniform("Mock exam", 5, 1800));

    // 2. Create test configuration and state
    let config = Config {
        backend_url: "http://backend.invalid".to_string(),
        database_url: "sqlite::memory:".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        autosave_interval_secs: 30,
        request_timeout_secs: 5,
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
    };

    let registry = Arc::new(SessionRegistry::new(
        Arc::new(backend.clone()),
        Arc::new(MemoryClockStore::new()),
        SessionSettings::from(&config),
    ));
    let state = AppState {
        registry,
        backend: Arc::new(backend.clone()),
    };

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, backend)
}

/// Starts an attempt of "mock-1" and enters it. Returns the attempt id.
async fn start_and_enter(client: &reqwest::Client, address: &str) -> String {
    let started: Value = client
        .post(format!("{}/api/tests/mock-1/attempts", address))
        .send()
        .await
        .expect("Start failed")
        .json()
        .await
        .expect("Failed to parse start json");
    let attempt_id = started["attemptId"]
        .as_str()
        .expect("attemptId not found")
        .to_string();

    let response = client
        .post(format!("{}/api/sessions/{}", address, attempt_id))
        .send()
        .await
        .expect("Enter failed");
    assert_eq!(response.status().as_u16(), 200);

    attempt_id
}

/// Polls the session view until its phase is `phase`.
async fn wait_for_phase(client: &reqwest::Client, address: &str, attempt_id: &str, phase: &str) -> Value {
    for _ in 0..50 {
        let view: Value = client
            .get(format!("{}/api/sessions/{}", address, attempt_id))
            .send()
            .await
            .expect("View failed")
            .json()
            .await
            .expect("Failed to parse view json");
        if view["phase"] == phase {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session never reached phase {}", phase);
}

/// Polls the session until the registry has dropped it.
async fn wait_until_evicted(client: &reqwest::Client, address: &str, attempt_id: &str) {
    for _ in 0..50 {
        let response = client
            .get(format!("{}/api/sessions/{}", address, attempt_id))
            .send()
            .await
            .expect("View failed");
        if response.status().as_u16() == 404 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session {} was never evicted", attempt_id);
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn start_attempt_works() {
    let (address, backend) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/tests/mock-1/attempts", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["attemptId"].is_string());
    assert_eq!(backend.attempt_ids().len(), 1);

    let missing = client
        .post(format!("{}/api/tests/nope/attempts", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn enter_shows_first_question_without_answer_key() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;

    let view: Value = client
        .post(format!("{}/api/sessions/{}", address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(view["route"], "exam");
    assert_eq!(view["phase"], "in_progress");
    assert_eq!(view["currentIndex"], 0);
    assert_eq!(view["totalQuestions"], 5);
    assert_eq!(view["attemptedCount"], 0);
    assert_eq!(view["question"]["questionNumber"], 1);
    assert!(view["question"].get("correctAnswer").is_none());
    assert_eq!(view["statuses"].as_array().unwrap().len(), 5);
    let remaining = view["remainingSeconds"].as_u64().unwrap();
    assert!(remaining > 1790 && remaining <= 1800);
}

#[tokio::test]
async fn answer_flag_and_navigate() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;
    let session_url = format!("{}/api/sessions/{}", address, attempt_id);

    let view: Value = client
        .put(format!("{}/answer", session_url))
        .json(&serde_json::json!({ "optionKey": "B" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["attemptedCount"], 1);
    assert_eq!(view["question"]["selected"], "B");
    assert_eq!(view["statuses"][0]["status"], "answered");

    let view: Value = client
        .post(format!("{}/flag", session_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["question"]["flagged"], true);

    let view: Value = client
        .post(format!("{}/navigate", session_url))
        .json(&serde_json::json!({ "action": "jump", "index": 4 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["currentIndex"], 4);
    assert_eq!(view["question"]["questionNumber"], 5);

    // No wrap past the last question
    let view: Value = client
        .post(format!("{}/navigate", session_url))
        .json(&serde_json::json!({ "action": "next" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["currentIndex"], 4);
    assert_eq!(view["attemptedCount"], 1);

    let out_of_range = client
        .post(format!("{}/navigate", session_url))
        .json(&serde_json::json!({ "action": "jump", "index": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status().as_u16(), 400);
}

#[tokio::test]
async fn select_answer_fails_validation() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;

    // Act: empty key
    let empty = client
        .put(format!("{}/api/sessions/{}/answer", address, attempt_id))
        .json(&serde_json::json!({ "optionKey": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);

    // Act: not an option of the question
    let unknown = client
        .put(format!("{}/api/sessions/{}/answer", address, attempt_id))
        .json(&serde_json::json!({ "optionKey": "Z" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 400);
}

#[tokio::test]
async fn submit_flow_routes_to_results() {
    let (address, backend) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;
    let session_url = format!("{}/api/sessions/{}", address, attempt_id);

    client
        .put(format!("{}/answer", session_url))
        .json(&serde_json::json!({ "optionKey": "A" }))
        .send()
        .await
        .unwrap();

    // 1. Unconfirmed submit only asks for confirmation
    let prompt = client
        .post(format!("{}/submit", session_url))
        .json(&serde_json::json!({ "confirmed": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(prompt.status().as_u16(), 200);
    let prompt: Value = prompt.json().await.unwrap();
    assert_eq!(prompt["status"], "confirmation_required");
    assert_eq!(prompt["attempted"], 1);
    assert_eq!(prompt["unanswered"], 4);
    assert_eq!(backend.submit_calls(), 0);

    // 2. Confirmed submit starts the submission
    let started = client
        .post(format!("{}/submit", session_url))
        .json(&serde_json::json!({ "confirmed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(started.status().as_u16(), 202);

    // 3. The finished session is dropped; further answers have nowhere to go
    wait_until_evicted(&client, &address, &attempt_id).await;
    let late = client
        .put(format!("{}/answer", session_url))
        .json(&serde_json::json!({ "optionKey": "B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(late.status().as_u16(), 404);

    // 4. Results are available and re-entering routes there
    let result: Value = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 10);
    assert_eq!(result["correctCount"], 1);
    assert_eq!(result["questions"][0]["correctAnswer"], "A");

    let reentered: Value = client
        .post(&session_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reentered["route"], "results");
    assert_eq!(reentered["attemptId"], attempt_id.as_str());
    assert_eq!(backend.submit_calls(), 1);
}

#[tokio::test]
async fn retry_after_failed_submit() {
    let (address, backend) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;
    let session_url = format!("{}/api/sessions/{}", address, attempt_id);

    // Nothing to retry yet
    let early = client.post(format!("{}/retry", session_url)).send().await.unwrap();
    assert_eq!(early.status().as_u16(), 409);

    backend.fail_next_submit(BackendError::Status(503));
    client
        .post(format!("{}/submit", session_url))
        .json(&serde_json::json!({ "confirmed": true }))
        .send()
        .await
        .unwrap();

    let failed = wait_for_phase(&client, &address, &attempt_id, "error").await;
    assert!(failed["message"].as_str().unwrap().contains("503"));

    let retried = client.post(format!("{}/retry", session_url)).send().await.unwrap();
    assert_eq!(retried.status().as_u16(), 202);
    wait_until_evicted(&client, &address, &attempt_id).await;
    assert_eq!(backend.submit_calls(), 2);

    let result = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(result.status().as_u16(), 200);
}

#[tokio::test]
async fn cors_preflight_allows_frontend_origin() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/sessions/x/answer", address))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "PUT")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    // Regular responses carry the header too
    let response = client
        .get(format!("{}/api/sessions/x", address))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn load_failure_is_retriable() {
    let (address, backend) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id: Value = client
        .post(format!("{}/api/tests/mock-1/attempts", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = attempt_id["attemptId"].as_str().unwrap().to_string();

    backend.fail_loads(Some(BackendError::Network("connection refused".to_string())));
    let response = client
        .post(format!("{}/api/sessions/{}", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["retriable"], true);

    // Nothing was registered
    let view = client
        .get(format!("{}/api/sessions/{}", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(view.status().as_u16(), 404);

    backend.fail_loads(None);
    let response = client
        .post(format!("{}/api/sessions/{}", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn unknown_attempt_returns_404() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/sessions/does-not-exist", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let result = client
        .get(format!("{}/api/attempts/does-not-exist/result", address))
        .send()
        .await
        .unwrap();
    assert_eq!(result.status().as_u16(), 404);
}

#[tokio::test]
async fn leaving_discards_session() {
    let (address, _) = spawn_app().await;
    let client = reqwest::Client::new();
    let attempt_id = start_and_enter(&client, &address).await;
    let session_url = format!("{}/api/sessions/{}", address, attempt_id);

    client
        .put(format!("{}/answer", session_url))
        .json(&serde_json::json!({ "optionKey": "C" }))
        .send()
        .await
        .unwrap();

    let left = client.delete(&session_url).send().await.unwrap();
    assert_eq!(left.status().as_u16(), 204);

    let gone = client.get(&session_url).send().await.unwrap();
    assert_eq!(gone.status().as_u16(), 404);

    // Coming back starts a fresh session on the same attempt
    let back = client.post(&session_url).send().await.unwrap();
    assert_eq!(back.status().as_u16(), 200);
}
