//! Board ↔ redb persistence.
//!
//! redb is a save file: loaded on boot, flushed on every mutation. It is
//! never queried at runtime — the Board is the runtime truth. Each flush
//! writes the one row an Event touched, plus the revision counter, in a
//! single transaction.

use crate::board::{Board, Event, Role, Task, User};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use std::sync::Arc;
use uuid::Uuid;

const BOARD_USERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("board_users");
const BOARD_TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("board_tasks");
const BOARD_META: TableDefinition<&str, &[u8]> = TableDefinition::new("board_meta");

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct SaveFile {
    db: Arc<Database>,
}

impl SaveFile {
    /// Open (or create) the save file at the given path.
    /// Creates tables if they don't exist.
    pub fn open(path: &str) -> Result<Self, SaveFileError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(BOARD_USERS)?;
            let _ = txn.open_table(BOARD_TASKS)?;
            let _ = txn.open_table(BOARD_META)?;
        }
        txn.commit()?;

        Ok(SaveFile { db: Arc::new(db) })
    }

    /// Load the entire Board from disk. Called once at boot.
    pub fn load_board(&self) -> Result<Board, SaveFileError> {
        let mut board = Board::new();
        let txn = self.db.begin_read()?;

        let users_table = txn.open_table(BOARD_USERS)?;
        for entry in users_table.iter()? {
            let (_, value) = entry?;
            let user: User = postcard::from_bytes(value.value())
                .map_err(|e| SaveFileError::Decode(e.to_string()))?;
            board.users.insert(user.id, user);
        }

        let tasks_table = txn.open_table(BOARD_TASKS)?;
        for entry in tasks_table.iter()? {
            let (_, value) = entry?;
            let task: Task = postcard::from_bytes(value.value())
                .map_err(|e| SaveFileError::Decode(e.to_string()))?;
            board.tasks.insert(task.id, task);
        }

        let meta_table = txn.open_table(BOARD_META)?;
        if let Some(rev_data) = meta_table.get("revision")? {
            let bytes = rev_data.value();
            if bytes.len() == 8 {
                board.revision = u64::from_le_bytes(bytes.try_into().unwrap());
            }
        }

        Ok(board)
    }

    /// Flush a single event to disk. Called after every Board::apply().
    /// The event carries the affected entity (or its id), so only that row
    /// and the revision counter are written.
    pub fn flush(&self, event: &Event) -> Result<(), SaveFileError> {
        let txn = self.db.begin_write()?;
        {
            match event {
                Event::UserCreated { user, .. } | Event::UserUpdated { user, .. } => {
                    let mut users = txn.open_table(BOARD_USERS)?;
                    let bytes = postcard::to_allocvec(user)
                        .map_err(|e| SaveFileError::Encode(e.to_string()))?;
                    users.insert(user.id.as_bytes().as_slice(), bytes.as_slice())?;
                }

                Event::UserDeleted { user_id, .. } => {
                    let mut users = txn.open_table(BOARD_USERS)?;
                    users.remove(user_id.as_bytes().as_slice())?;
                }

                Event::TaskCreated { task, .. } | Event::TaskUpdated { task, .. } => {
                    let mut tasks = txn.open_table(BOARD_TASKS)?;
                    let bytes = postcard::to_allocvec(task)
                        .map_err(|e| SaveFileError::Encode(e.to_string()))?;
                    tasks.insert(task.id.as_bytes().as_slice(), bytes.as_slice())?;
                }

                Event::TaskDeleted { task_id, .. } => {
                    let mut tasks = txn.open_table(BOARD_TASKS)?;
                    tasks.remove(task_id.as_bytes().as_slice())?;
                }
            }

            // Always update revision
            let mut meta = txn.open_table(BOARD_META)?;
            meta.insert("revision", event.revision().to_le_bytes().as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Write a user row directly (for seeding, outside the apply path).
    pub fn save_user(&self, user: &User) -> Result<(), SaveFileError> {
        let txn = self.db.begin_write()?;
        {
            let mut users = txn.open_table(BOARD_USERS)?;
            let bytes = postcard::to_allocvec(user)
                .map_err(|e| SaveFileError::Encode(e.to_string()))?;
            users.insert(user.id.as_bytes().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Seed a default manager if no users exist, so the fixed identity
    /// provider resolves to a real user on first boot. Returns true if
    /// created.
    pub fn ensure_default_manager(&self, board: &mut Board) -> Result<bool, SaveFileError> {
        if !board.users.is_empty() {
            return Ok(false);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: "manager".to_string(),
            role: Role::Manager,
            created_at: Utc::now(),
        };

        self.save_user(&user)?;
        board.users.insert(user.id, user);
        Ok(true)
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SaveFileError {
    Redb(String),
    Decode(String),
    Encode(String),
}

// redb 2.x has many error types. Blanket them all into SaveFileError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for SaveFileError {
            fn from(e: $t) -> Self { SaveFileError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

impl std::fmt::Display for SaveFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveFileError::Redb(e) => write!(f, "redb: {e}"),
            SaveFileError::Decode(e) => write!(f, "decode: {e}"),
            SaveFileError::Encode(e) => write!(f, "encode: {e}"),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
