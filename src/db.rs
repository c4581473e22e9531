//! Database module for order flow
//!
//! Persists suspended conversations so a thread can be resumed without the
//! caller echoing its snapshot back.

mod schema;

pub use schema::*;

use crate::state_machine::ConversationState;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored state is not valid: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== Checkpoint Operations ====================

    /// Insert or replace the checkpoint for a thread
    pub fn save_checkpoint(
        &self,
        thread_id: &str,
        state: &ConversationState,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        self.conn()?.execute(
            "INSERT INTO checkpoints (thread_id, state, step, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                step = excluded.step,
                updated_at = excluded.updated_at",
            params![thread_id, json, state.current_step.as_str(), timestamp(at)],
        )?;
        Ok(())
    }

    /// Get a thread's checkpoint without removing it
    pub fn get_checkpoint(&self, thread_id: &str) -> DbResult<Option<Checkpoint>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT state, updated_at FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        row.map(|(state, updated_at)| decode_checkpoint(thread_id, &state, &updated_at))
            .transpose()
    }

    /// Remove and return a thread's checkpoint in one statement.
    ///
    /// The row is gone even when it fails to decode.
    pub fn take_checkpoint(&self, thread_id: &str) -> DbResult<Option<Checkpoint>> {
        let row = self
            .conn()?
            .query_row(
                "DELETE FROM checkpoints WHERE thread_id = ?1 RETURNING state, updated_at",
                params![thread_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        row.map(|(state, updated_at)| decode_checkpoint(thread_id, &state, &updated_at))
            .transpose()
    }

    /// Returns whether a checkpoint was deleted
    pub fn delete_checkpoint(&self, thread_id: &str) -> DbResult<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM checkpoints WHERE thread_id = ?1", params![thread_id])?;
        Ok(deleted > 0)
    }

    /// Delete checkpoints last written before `cutoff`
    pub fn delete_checkpoints_before(&self, cutoff: DateTime<Utc>) -> DbResult<usize> {
        let deleted = self.conn()?.execute(
            "DELETE FROM checkpoints WHERE updated_at < ?1",
            params![timestamp(cutoff)],
        )?;
        Ok(deleted)
    }

    pub fn checkpoint_count(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn decode_checkpoint(thread_id: &str, state: &str, updated_at: &str) -> DbResult<Checkpoint> {
    Ok(Checkpoint {
        thread_id: thread_id.to_string(),
        state: serde_json::from_str(state)?,
        updated_at: parse_datetime(updated_at)?,
    })
}

// Fixed-width UTC timestamps so they order correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
