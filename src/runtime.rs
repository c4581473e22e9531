//! Runtime for executing conversations
//!
//! The manager issues thread ids, drives the workflow for each turn and keeps
//! suspended conversations in a checkpoint store so a caller may continue a
//! thread without echoing its snapshot back.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::state_machine::{ConversationState, SnapshotError, TurnOutcome, Workflow};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::Instrument;

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please start a new conversation.";
pub const NOT_WAITING_MESSAGE: &str =
    "I'm not sure how to help with that. Could you start a new conversation?";

// Used only when a turn produced no text
const START_FALLBACK_MESSAGE: &str = "Hello! How can I help you?";
const WAITING_FALLBACK_MESSAGE: &str = "Please respond:";
const COMPLETE_FALLBACK_MESSAGE: &str = "Thank you!";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("checkpoint store error: {0}")]
    Checkpoint(String),
}

/// What the caller sees after one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub message: String,
    pub thread_id: String,
    pub is_complete: bool,
    pub waiting_for_input: bool,
    /// Present only while the conversation waits for input
    pub current_state: Option<ConversationState>,
}

impl TurnReply {
    fn from_outcome(thread_id: &str, outcome: TurnOutcome, fallback: &str) -> Self {
        let message = outcome
            .state
            .last_message()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
            .to_string();
        Self {
            message,
            thread_id: thread_id.to_string(),
            is_complete: outcome.is_complete(),
            waiting_for_input: outcome.suspended,
            current_state: outcome.suspended.then_some(outcome.state),
        }
    }

    fn terminal(thread_id: &str, message: &str) -> Self {
        Self {
            message: message.to_string(),
            thread_id: thread_id.to_string(),
            is_complete: true,
            waiting_for_input: false,
            current_state: None,
        }
    }
}

/// Manager for all conversations
pub struct ConversationManager {
    workflow: Workflow,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    checkpoint_ttl: chrono::Duration,
    thread_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    /// `checkpoints: None` runs in stateless round-trip mode only
    pub fn new(
        workflow: Workflow,
        checkpoints: Option<Arc<dyn CheckpointStore>>,
        checkpoint_ttl: chrono::Duration,
    ) -> Self {
        Self {
            workflow,
            checkpoints,
            checkpoint_ttl,
            thread_locks: RwLock::new(HashMap::new()),
        }
    }

    /// Begin a new conversation from the user's first message
    pub async fn start(&self, user_query: &str) -> Result<TurnReply, RuntimeError> {
        let thread_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("conversation", thread_id = %thread_id);

        async {
            let outcome = self
                .workflow
                .run_until_suspend_or_terminal(ConversationState::new(user_query))
                .await;
            if outcome.suspended {
                self.save_checkpoint(&thread_id, &outcome.state).await?;
            }
            tracing::info!(
                step = %outcome.state.current_step,
                waiting = outcome.suspended,
                "Conversation started"
            );
            Ok::<_, RuntimeError>(TurnReply::from_outcome(
                &thread_id,
                outcome,
                START_FALLBACK_MESSAGE,
            ))
        }
        .instrument(span)
        .await
    }

    /// Process the user's reply on an existing thread.
    ///
    /// A supplied snapshot wins over a stored checkpoint. With neither, the
    /// thread is reported as expired.
    pub async fn continue_conversation(
        &self,
        thread_id: &str,
        user_response: &str,
        snapshot: Option<Value>,
    ) -> Result<TurnReply, RuntimeError> {
        let span = tracing::info_span!("conversation", thread_id = %thread_id);
        async {
            let reply = {
                let _turn = self.lock_thread(thread_id).await;
                self.continue_locked(thread_id, user_response, snapshot).await
            };
            self.release_thread(thread_id).await;
            reply
        }
        .instrument(span)
        .await
    }

    async fn continue_locked(
        &self,
        thread_id: &str,
        user_response: &str,
        snapshot: Option<Value>,
    ) -> Result<TurnReply, RuntimeError> {
        let state = match snapshot {
            Some(snapshot) => {
                let state = ConversationState::from_snapshot(snapshot, user_response)?;
                // The caller's copy supersedes anything stored for this thread
                self.remove_checkpoint(thread_id).await?;
                state
            }
            None => match self.take_checkpoint(thread_id).await? {
                Some(state) => state,
                None => {
                    tracing::info!("No snapshot or checkpoint for thread");
                    return Ok(TurnReply::terminal(thread_id, SESSION_EXPIRED_MESSAGE));
                }
            },
        };

        let state = self.repair_search_results(state);
        let outcome = match self.workflow.resume(state, user_response).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Continuation on a conversation that is not waiting");
                return Ok(TurnReply::terminal(thread_id, NOT_WAITING_MESSAGE));
            }
        };

        if outcome.suspended {
            self.save_checkpoint(thread_id, &outcome.state).await?;
        }
        tracing::info!(
            step = %outcome.state.current_step,
            waiting = outcome.suspended,
            "Conversation continued"
        );

        let fallback = if outcome.suspended {
            WAITING_FALLBACK_MESSAGE
        } else {
            COMPLETE_FALLBACK_MESSAGE
        };
        Ok(TurnReply::from_outcome(thread_id, outcome, fallback))
    }

    /// Drop expired checkpoints and idle thread locks; returns how many
    /// checkpoints were removed
    pub async fn purge_expired(&self) -> Result<usize, RuntimeError> {
        self.thread_locks
            .write()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        let Some(store) = &self.checkpoints else {
            return Ok(0);
        };
        store
            .purge_expired(self.checkpoint_ttl)
            .await
            .map_err(RuntimeError::Checkpoint)
    }

    // At most one in-flight turn per thread
    async fn lock_thread(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.thread_locks.write().await;
            locks.entry(thread_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    // Drop the thread's lock entry unless another turn is queued on it
    async fn release_thread(&self, thread_id: &str) {
        let mut locks = self.thread_locks.write().await;
        if locks
            .get(thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(thread_id);
        }
    }

    /// Snapshots that reach a suspend step without search results get them
    /// rebuilt from the original query.
    fn repair_search_results(&self, mut state: ConversationState) -> ConversationState {
        if state.current_step.is_suspend() && state.search_results.is_empty() {
            let restored = self
                .workflow
                .catalog()
                .reconstruct_from_query(&state.user_query);
            if !restored.is_empty() {
                tracing::info!(
                    restored = restored.len(),
                    "Rebuilt search results from the original query"
                );
                state.search_results = restored;
            }
        }
        state
    }

    async fn save_checkpoint(
        &self,
        thread_id: &str,
        state: &ConversationState,
    ) -> Result<(), RuntimeError> {
        let Some(store) = &self.checkpoints else {
            return Ok(());
        };
        store.save(thread_id, state).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to save checkpoint");
            RuntimeError::Checkpoint(e)
        })?;
        tracing::debug!(step = %state.current_step, "Checkpoint saved");
        Ok(())
    }

    async fn take_checkpoint(
        &self,
        thread_id: &str,
    ) -> Result<Option<ConversationState>, RuntimeError> {
        let Some(store) = &self.checkpoints else {
            return Ok(None);
        };
        let state = store
            .take(thread_id, self.checkpoint_ttl)
            .await
            .map_err(RuntimeError::Checkpoint)?;
        tracing::debug!(found = state.is_some(), "Checkpoint loaded");
        Ok(state)
    }

    async fn remove_checkpoint(&self, thread_id: &str) -> Result<(), RuntimeError> {
        match &self.checkpoints {
            Some(store) => store
                .remove(thread_id)
                .await
                .map_err(RuntimeError::Checkpoint),
            None => Ok(()),
        }
    }
}
