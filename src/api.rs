//! HTTP API for the order conversation service

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::ConversationManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationManager>,
}

impl AppState {
    pub fn new(conversations: Arc<ConversationManager>) -> Self {
        Self { conversations }
    }
}
