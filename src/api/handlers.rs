//! HTTP request handlers

use super::types::*;
use super::AppState;
use crate::runtime::RuntimeError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/start-conversation", post(start_conversation))
        .route("/continue-conversation", post(continue_conversation))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================
// Conversation Handlers
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let reply = state
        .conversations
        .start(&req.user_query)
        .await
        .map_err(|e| AppError::from_runtime("Error processing query", e))?;
    Ok(Json(reply.into()))
}

async fn continue_conversation(
    State(state): State<AppState>,
    Json(req): Json<ContinueConversationRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    let reply = state
        .conversations
        .continue_conversation(&req.thread_id, &req.user_response, req.current_state)
        .await
        .map_err(|e| AppError::from_runtime("Error continuing conversation", e))?;
    Ok(Json(reply.into()))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl AppError {
    fn from_runtime(context: &str, err: RuntimeError) -> Self {
        tracing::error!(error = %err, "{context}");
        let detail = format!("{context}: {err}");
        match err {
            RuntimeError::Snapshot(_) => AppError::BadRequest(detail),
            RuntimeError::Checkpoint(_) => AppError::Internal(detail),
        }
    }
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
