// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, session},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Nests the attempt routes (start test, results) and the session routes.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (session registry and backend client).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let test_routes = Router::new().route("/{test_id}/attempts", post(attempt::start_attempt));

    let attempt_routes = Router::new().route("/{attempt_id}/result", get(attempt::get_result));

    let session_routes = Router::new()
        .route(
            "/{attempt_id}",
            post(session::enter)
                .get(session::get_session)
                .delete(session::leave),
        )
        .route(
            "/{attempt_id}/answer",
            put(session::select_answer).delete(session::clear_answer),
        )
        .route("/{attempt_id}/flag", post(session::toggle_flag))
        .route("/{attempt_id}/navigate", post(session::navigate))
        .route("/{attempt_id}/submit", post(session::submit))
        .route("/{attempt_id}/retry", post(session::retry));

    Router::new()
        .nest("/api/tests", test_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
