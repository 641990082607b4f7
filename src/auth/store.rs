//! Credential stores
//!
//! `SqliteCredentials` persists `users(username, password_hash)` with the
//! username as primary key. `MemoryCredentials` keeps the same mapping in a
//! `HashMap` for tests and embedding.

use super::{CredentialLookup, Result, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL
)";

/// SQLite-backed credential table
pub struct SqliteCredentials {
    conn: Mutex<Connection>,
}

impl SqliteCredentials {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database, empty on creation
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_USERS, [])?;
        Ok(SqliteCredentials {
            conn: Mutex::new(conn),
        })
    }

    /// Add a user or replace the stored hash of an existing one
    pub fn insert(&self, username: &str, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)
             ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash",
            params![username, password_hash],
        )?;
        Ok(())
    }

    /// Number of stored users
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl CredentialLookup for SqliteCredentials {
    fn password_hash(&self, username: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let hash = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }
}

/// In-memory credential map
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    users: HashMap<String, String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user or replace the stored hash of an existing one
    pub fn insert(&mut self, username: impl Into<String>, password_hash: impl Into<String>) {
        self.users.insert(username.into(), password_hash.into());
    }
}

impl FromIterator<(String, String)> for MemoryCredentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        MemoryCredentials {
            users: iter.into_iter().collect(),
        }
    }
}

impl CredentialLookup for MemoryCredentials {
    fn password_hash(&self, username: &str) -> Result<Option<String>> {
        Ok(self.users.get(username).cloned())
    }
}
