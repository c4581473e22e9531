//! Trait abstractions for conversation persistence
//!
//! These traits let the manager run against SQLite in production and an
//! in-memory map in tests or when no database is configured.

use crate::state_machine::ConversationState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Storage for suspended conversations, keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store the suspended state for a thread, replacing any previous one
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String>;

    /// Remove and return the thread's checkpoint if it is younger than `max_age`
    async fn take(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<Option<ConversationState>, String>;

    /// Drop the thread's checkpoint, if any
    async fn remove(&self, thread_id: &str) -> Result<(), String>;

    /// Drop every checkpoint older than `max_age`; returns how many were dropped
    async fn purge_expired(&self, max_age: Duration) -> Result<usize, String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        (**self).save(thread_id, state).await
    }

    async fn take(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<Option<ConversationState>, String> {
        (**self).take(thread_id, max_age).await
    }

    async fn remove(&self, thread_id: &str) -> Result<(), String> {
        (**self).remove(thread_id).await
    }

    async fn purge_expired(&self, max_age: Duration) -> Result<usize, String> {
        (**self).purge_expired(max_age).await
    }
}

fn is_expired(saved_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    now - saved_at > max_age
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local checkpoints; lost on restart
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, (ConversationState, DateTime<Utc>)>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (ConversationState, DateTime<Utc>)>>, String>
    {
        self.entries.lock().map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn backdate(&self, thread_id: &str, age: Duration) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(thread_id) {
            entry.1 = Utc::now() - age;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        self.entries()?
            .insert(thread_id.to_string(), (state.clone(), Utc::now()));
        Ok(())
    }

    async fn take(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<Option<ConversationState>, String> {
        let entry = self.entries()?.remove(thread_id);
        Ok(entry
            .filter(|(_, saved_at)| !is_expired(*saved_at, max_age, Utc::now()))
            .map(|(state, _)| state))
    }

    async fn remove(&self, thread_id: &str) -> Result<(), String> {
        self.entries()?.remove(thread_id);
        Ok(())
    }

    async fn purge_expired(&self, max_age: Duration) -> Result<usize, String> {
        let now = Utc::now();
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, (_, saved_at)| !is_expired(*saved_at, max_age, now));
        Ok(before - entries.len())
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::{Database, DbError};

/// Adapter to use Database as a CheckpointStore
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    db: Database,
}

impl SqliteCheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db
            .save_checkpoint(thread_id, state, Utc::now())
            .map_err(|e| e.to_string())
    }

    async fn take(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<Option<ConversationState>, String> {
        let checkpoint = match self.db.take_checkpoint(thread_id) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => return Ok(None),
            Err(DbError::Corrupt(e)) => {
                tracing::warn!(thread_id, error = %e, "Dropped unreadable checkpoint");
                return Ok(None);
            }
            Err(e) => return Err(e.to_string()),
        };
        if is_expired(checkpoint.updated_at, max_age, Utc::now()) {
            return Ok(None);
        }
        Ok(Some(checkpoint.state))
    }

    async fn remove(&self, thread_id: &str) -> Result<(), String> {
        self.db
            .delete_checkpoint(thread_id)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn purge_expired(&self, max_age: Duration) -> Result<usize, String> {
        self.db
            .delete_checkpoints_before(Utc::now() - max_age)
            .map_err(|e| e.to_string())
    }
}
