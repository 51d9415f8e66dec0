//! Schema versions of the timekeeper store.
//!
//! Each migration is a batch of SQL tagged with a version. Pending batches are
//! applied in order, inside one transaction, when the service connects, and
//! every applied version is recorded in `migrations` with its timestamp.
//!
//! ```rust,no_run
//! use timekeeper::db::migrations::{get_db_version, init_with_migrations};
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("timekeeper.db")?;
//! init_with_migrations(&mut conn)?;
//! assert_eq!(get_db_version(&conn)?, 3);
//! # Ok::<(), timekeeper::libs::error::Error>(())
//! ```

use crate::libs::error::{Error, Result};
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info};
use rusqlite::{params, Connection, Transaction};

const HISTORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";
const RECORD_VERSION: &str = "INSERT INTO migrations (version, name) VALUES (?1, ?2)";
const SELECT_VERSION: &str = "SELECT COALESCE(MAX(version), 0) FROM migrations";
const SELECT_APPLIED: &str = "SELECT EXISTS(SELECT 1 FROM migrations WHERE version = ?1)";
const SELECT_HISTORY: &str = "SELECT version, name, applied_at FROM migrations ORDER BY version";

// Catalog references (task -> project, activity -> label) are soft so that the
// three core tables can be bulk loaded on their own.
const CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS projecttype (
    name TEXT NOT NULL PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS project (
    title TEXT NOT NULL PRIMARY KEY,
    projecttype TEXT
);
CREATE TABLE IF NOT EXISTS trackedtask (
    repository_url TEXT NOT NULL,
    task_id TEXT NOT NULL,
    task_project TEXT,
    task_url TEXT,
    task_summary TEXT,
    current_activity_id INTEGER
        REFERENCES activity(id) ON DELETE SET NULL DEFERRABLE INITIALLY DEFERRED,
    PRIMARY KEY (repository_url, task_id)
);
CREATE TABLE IF NOT EXISTS activity (
    id INTEGER PRIMARY KEY,
    repository_url TEXT NOT NULL,
    task_id TEXT NOT NULL,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP,
    label TEXT,
    comment TEXT,
    FOREIGN KEY (repository_url, task_id)
        REFERENCES trackedtask(repository_url, task_id) ON DELETE CASCADE,
    CHECK (end_time IS NULL OR end_time >= start_time)
);
CREATE TABLE IF NOT EXISTS trackedtask_activity (
    task_repository_url TEXT NOT NULL,
    task_task_id TEXT NOT NULL,
    activities_id INTEGER NOT NULL PRIMARY KEY,
    FOREIGN KEY (task_repository_url, task_task_id)
        REFERENCES trackedtask(repository_url, task_id) ON DELETE CASCADE,
    FOREIGN KEY (activities_id) REFERENCES activity(id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS activitylabel (
    name TEXT NOT NULL PRIMARY KEY,
    color TEXT
);";

const ACTIVITY_INDICES: &str = "
CREATE INDEX IF NOT EXISTS idx_activity_task ON activity(repository_url, task_id);
CREATE INDEX IF NOT EXISTS idx_activity_start ON activity(start_time);
CREATE INDEX IF NOT EXISTS idx_trackedtask_activity_task
    ON trackedtask_activity(task_repository_url, task_task_id);";

const SETTINGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);";

#[derive(Debug)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Every schema change, oldest first.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_timekeeper_tables",
        sql: CORE_TABLES,
    },
    Migration {
        version: 2,
        name: "add_activity_indices",
        sql: ACTIVITY_INDICES,
    },
    Migration {
        version: 3,
        name: "create_settings_table",
        sql: SETTINGS_TABLE,
    },
];

pub struct MigrationManager {
    migrations: &'static [Migration],
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationManager {
    pub fn new() -> Self {
        Self { migrations: MIGRATIONS }
    }

    /// Brings the schema up to the latest version, all or nothing.
    pub fn run_migrations(&self, conn: &mut Connection) -> Result<()> {
        let current = current_version(conn)?;
        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current).collect();
        let Some(target) = pending.last().map(|m| m.version) else {
            msg_debug!("Database is up to date");
            return Ok(());
        };

        msg_debug!(Message::MigrationsFound(pending.len()));
        let tx = conn.transaction()?;
        for migration in pending {
            apply(&tx, migration)?;
        }
        tx.commit()?;
        msg_info!(Message::MigrationsCompleted(target));
        Ok(())
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.iter().map(|m| m.version).max().unwrap_or(0)
    }

    pub fn is_migration_applied(&self, conn: &Connection, version: u32) -> Result<bool> {
        conn.execute(HISTORY_TABLE, [])?;
        Ok(conn.query_row(SELECT_APPLIED, params![version], |row| row.get(0))?)
    }

    /// Applied migrations as `(version, name, applied_at)`, oldest first.
    pub fn get_migration_history(&self, conn: &Connection) -> Result<Vec<(u32, String, String)>> {
        conn.execute(HISTORY_TABLE, [])?;
        let mut stmt = conn.prepare(SELECT_HISTORY)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn apply(tx: &Transaction, migration: &Migration) -> Result<()> {
    msg_debug!(Message::RunningMigration(migration.version, migration.name.to_string()));
    tx.execute_batch(migration.sql).map_err(|e| {
        msg_error!(Message::MigrationFailed(migration.version, e.to_string()));
        Error::from(e)
    })?;
    tx.execute(RECORD_VERSION, params![migration.version, migration.name])?;
    Ok(())
}

/// Highest applied version. Creates the history table on a fresh store.
fn current_version(conn: &Connection) -> Result<u32> {
    conn.execute(HISTORY_TABLE, [])?;
    Ok(conn.query_row(SELECT_VERSION, [], |row| row.get(0))?)
}

pub fn init_with_migrations(conn: &mut Connection) -> Result<()> {
    MigrationManager::new().run_migrations(conn)
}

/// Version of the schema. A store that was never migrated reports 0.
pub fn get_db_version(conn: &Connection) -> Result<u32> {
    current_version(conn)
}

pub fn needs_migration(conn: &Connection) -> Result<bool> {
    Ok(current_version(conn)? < MigrationManager::new().latest_version())
}
