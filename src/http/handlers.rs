use super::state::AppState;
use crate::assistant::AssistantState;
use crate::protocol::SessionStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TestPhraseRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TestPhraseResponse {
    pub status: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Report the assistant state, or 503 when it ended up in error
fn state_response(state: AssistantState) -> Response {
    if state.status == SessionStatus::Error {
        let error = state
            .last_error
            .clone()
            .unwrap_or_else(|| "Voice session failed".to_string());
        return error_response(StatusCode::SERVICE_UNAVAILABLE, error);
    }
    (StatusCode::OK, Json(state)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /voice/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.assistant.state()))
}

/// POST /voice/start
/// Start a session if needed, then start capture
pub async fn start_listening(State(state): State<AppState>) -> Response {
    info!("Start listening requested");
    state.assistant.start_listening().await;
    state_response(state.assistant.state())
}

/// POST /voice/stop
/// Stop capture; the session stays up
pub async fn stop_listening(State(state): State<AppState>) -> Response {
    info!("Stop listening requested");
    state.assistant.stop_listening().await;
    (StatusCode::OK, Json(state.assistant.state())).into_response()
}

/// POST /voice/toggle
pub async fn toggle_listening(State(state): State<AppState>) -> Response {
    state.assistant.toggle_listening().await;
    state_response(state.assistant.state())
}

/// GET /voice/shopping-list
pub async fn get_shopping_list(State(state): State<AppState>) -> Response {
    match state.assistant.state().shopping_list {
        Some(list) => (StatusCode::OK, Json(list)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No shopping list yet"),
    }
}

/// DELETE /voice/shopping-list
/// Return the snapshot and clear it, so the caller can persist the items
pub async fn take_shopping_list(State(state): State<AppState>) -> Response {
    match state.assistant.take_shopping_list() {
        Some(list) => {
            info!("Shopping list handed over: {} items", list.len());
            (StatusCode::OK, Json(list)).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No shopping list yet"),
    }
}

/// POST /voice/test
/// Send a text phrase through the session instead of audio
pub async fn send_test_phrase(
    State(state): State<AppState>,
    Json(req): Json<TestPhraseRequest>,
) -> Response {
    let text = req.text.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Text must not be empty");
    }

    if !state.assistant.send_test_phrase(text) {
        warn!("Test phrase rejected: session not active");
        return error_response(StatusCode::CONFLICT, "Voice session is not active");
    }

    (
        StatusCode::ACCEPTED,
        Json(TestPhraseResponse {
            status: "sent".to_string(),
            text: text.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
