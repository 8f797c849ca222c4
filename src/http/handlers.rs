use super::state::AppState;
use crate::chat::{ChatMessage, Model};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub slug: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub model: Model,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn parse_model(slug: &str) -> Result<Model, Response> {
    slug.parse::<Model>().map_err(|e| {
        warn!("Rejected request for unknown model: {}", slug);
        error_response(StatusCode::NOT_FOUND, e.to_string())
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /models
/// List selectable models
pub async fn list_models() -> impl IntoResponse {
    let models: Vec<ModelInfo> = Model::ALL
        .into_iter()
        .map(|model| ModelInfo {
            slug: model.slug(),
            name: model.label(),
        })
        .collect();

    Json(models)
}

/// GET /chat/:model/messages
/// History for one model
pub async fn get_history(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Response {
    let model = match parse_model(&model) {
        Ok(model) => model,
        Err(response) => return response,
    };

    Json(MessagesResponse {
        model,
        messages: state.chat.history(model),
    })
    .into_response()
}

/// POST /chat/:model/messages
/// Send a prompt; returns the messages appended to the history
pub async fn send_message(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let model = match parse_model(&model) {
        Ok(model) => model,
        Err(response) => return response,
    };

    if req.prompt.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Prompt is empty".to_string());
    }

    info!("Prompt for {} ({} chars)", model, req.prompt.len());
    let messages = state.chat.send_message(model, &req.prompt).await;

    (StatusCode::OK, Json(MessagesResponse { model, messages })).into_response()
}

/// DELETE /chat/:model/messages
/// Start a new chat for one model
pub async fn new_chat(State(state): State<AppState>, Path(model): Path<String>) -> Response {
    let model = match parse_model(&model) {
        Ok(model) => model,
        Err(response) => return response,
    };

    state.chat.new_chat(model).await;
    StatusCode::NO_CONTENT.into_response()
}

/// POST /chat/:model/messages/:id/execute-plan
/// Execute a proposed research plan once
pub async fn execute_plan(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, u64)>,
) -> Response {
    let model = match parse_model(&model) {
        Ok(model) => model,
        Err(response) => return response,
    };

    match state.chat.execute_plan(model, id).await {
        Some(message) => (StatusCode::OK, Json(message)).into_response(),
        None => error_response(
            StatusCode::CONFLICT,
            format!("Message {} has no pending research plan", id),
        ),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
