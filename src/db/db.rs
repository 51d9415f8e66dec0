use crate::libs::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DB_FILE_NAME: &str = "timekeeper.db";

/// Where and how to open connections to the store.
#[derive(Debug, Clone)]
pub struct Db {
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl Db {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    /// Opens a fresh connection with foreign keys enforced, WAL journaling
    /// and the configured busy timeout.
    pub fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.failure(e))?;
        }
        let conn = Connection::open(&self.path).map_err(|e| self.failure(e))?;
        conn.busy_timeout(self.busy_timeout).map_err(|e| self.failure(e))?;
        conn.pragma_update(None, "foreign_keys", true).map_err(|e| self.failure(e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| self.failure(e))?;
        Ok(conn)
    }

    pub fn location(&self) -> &Path {
        &self.path
    }

    fn failure(&self, reason: impl std::fmt::Display) -> Error {
        Error::ConnectionFailure {
            location: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
