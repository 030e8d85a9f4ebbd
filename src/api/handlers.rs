//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ClientAction, ErrorResponse, MemoryResponse, ResetRequest,
    SuccessResponse,
};
use super::{AppState, DEFAULT_SESSION};
use crate::transcript::{TranscriptEntry, ASSISTANT_SENDER, USER_SENDER};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

/// Create the API router; anything unmatched is served from `ui_dir`
pub fn create_router(state: AppState, ui_dir: &Path) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/reset", post(reset))
        .route("/api/history", get(get_history))
        .route("/api/memory", get(get_memory))
        .route("/version", get(get_version))
        .fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }
    let session_id = session_or_default(req.session_id.as_deref());

    record_transcript(&state, USER_SENDER, message);
    record_interaction(&state, message);

    let history = state.sessions.session(session_id).await;
    let response = {
        let mut history = history.lock().await;
        state.engine.handle(&mut history, message).await
    };

    record_transcript(&state, ASSISTANT_SENDER, &response);
    let action = detect_action(&response);
    tracing::info!(session = %session_id, action = ?action, "Chat handled");

    Ok(Json(ChatResponse {
        response,
        status: "success",
        action,
    }))
}

async fn reset(
    State(state): State<AppState>,
    body: Option<Json<ResetRequest>>,
) -> Json<SuccessResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let session_id = session_or_default(req.session_id.as_deref());

    let history = state.sessions.session(session_id).await;
    state.engine.reset(&mut *history.lock().await);
    tracing::info!(session = %session_id, "Session reset");

    Json(SuccessResponse { success: true })
}

fn session_or_default(id: Option<&str>) -> &str {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_SESSION)
}

/// Keyword cues in a reply that ask the UI to use a device sensor
fn detect_action(response: &str) -> Option<ClientAction> {
    let lowered = response.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    if has_any(&["visual scan", "activating camera"]) {
        Some(ClientAction::OpenCamera)
    } else if has_any(&["coordinates", "gps", "location"]) && has_any(&["request", "secure"]) {
        Some(ClientAction::RequestLocation)
    } else {
        None
    }
}

fn record_transcript(state: &AppState, sender: &str, text: &str) {
    let result = match state.transcript.lock() {
        Ok(mut log) => log.append(sender, text),
        Err(_) => {
            tracing::error!("Transcript lock poisoned");
            return;
        }
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to write transcript");
    }
}

fn record_interaction(state: &AppState, message: &str) {
    let result = match state.memory.lock() {
        Ok(mut memory) => memory.add_to_history(message),
        Err(_) => {
            tracing::error!("Memory store lock poisoned");
            return;
        }
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to record interaction");
    }
}

// ============================================================
// History & Memory
// ============================================================

async fn get_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<TranscriptEntry>>, AppError> {
    let log = state
        .transcript
        .lock()
        .map_err(|_| AppError::Internal("Transcript unavailable".to_string()))?;
    Ok(Json(log.entries().to_vec()))
}

async fn get_memory(State(state): State<AppState>) -> Result<Json<MemoryResponse>, AppError> {
    let memory = state
        .memory
        .lock()
        .map_err(|_| AppError::Internal("Memory store unavailable".to_string()))?;
    Ok(Json(MemoryResponse {
        facts: memory.all_facts(),
        preferences: memory.all_preferences().clone(),
    }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("jarvis ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
