//! Database schema and row types

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    step TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints(updated_at);
";

/// A suspended conversation as stored
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: ConversationState,
    pub updated_at: DateTime<Utc>,
}
