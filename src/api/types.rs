//! API request and response types

use crate::runtime::TurnReply;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to begin a conversation
#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub user_query: String,
}

/// Request to answer the assistant on an existing thread
#[derive(Debug, Deserialize)]
pub struct ContinueConversationRequest {
    pub user_response: String,
    pub thread_id: String,
    /// Snapshot from the previous response, echoed back
    #[serde(default)]
    pub current_state: Option<Value>,
}

/// Response to both conversation endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub message: String,
    pub thread_id: String,
    pub is_complete: bool,
    pub waiting_for_input: bool,
    pub current_state: Option<Value>,
}

impl From<TurnReply> for ConversationResponse {
    fn from(reply: TurnReply) -> Self {
        Self {
            message: reply.message,
            thread_id: reply.thread_id,
            is_complete: reply.is_complete,
            waiting_for_input: reply.waiting_for_input,
            current_state: reply.current_state.map(|state| state.to_snapshot()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
