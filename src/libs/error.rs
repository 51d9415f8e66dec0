//! Error types for the timekeeper service.
//!
//! Every fallible library operation returns [`Result`]. Failures raised inside a
//! unit of work reach the caller wrapped in [`Error::TransactionFailure`], after
//! the transaction has already been rolled back. Use [`Error::cause`] to look
//! through that wrapper at the original failure.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The backing store has not finished connecting yet.
    #[error("Timekeeper database is not ready")]
    NotReady,

    /// The service has been closed and accepts no further requests.
    #[error("Timekeeper service has been closed")]
    Closed,

    /// A failure inside a unit of work. The transaction was rolled back.
    #[error("Transaction rolled back: {0}")]
    TransactionFailure(#[source] Box<Error>),

    /// A nested operation failed and the outermost caller tried to commit anyway.
    #[error("Transaction was marked rollback-only")]
    RollbackOnly,

    /// Uniqueness violation when two creators race on the same key.
    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    /// Import precondition not met.
    #[error("'{0}' does not exist in the specified location")]
    MissingInputFile(String),

    /// Import file present but not in the expected layout.
    #[error("Malformed input in '{file}': {reason}")]
    MalformedInput { file: String, reason: String },

    /// The backing store session could not be established.
    #[error("Could not connect to timekeeper database at {location}: {reason}")]
    ConnectionFailure { location: String, reason: String },

    /// An activity end time earlier than its start.
    #[error("Activity cannot end at {end} before it started at {start}")]
    InvalidInterval { start: String, end: String },

    #[error("Activity {0} does not belong to this task")]
    ActivityNotFound(i64),

    /// A second open activity offered to a task that already has one running.
    #[error("Task {0} already has a running activity")]
    ActivityRunning(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the original failure, skipping any transaction wrappers.
    pub fn cause(&self) -> &Error {
        match self {
            Error::TransactionFailure(inner) => inner.cause(),
            other => other,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.cause(), Error::Conflict { .. })
    }

    /// Wraps a failure raised inside a unit of work, never twice.
    pub(crate) fn in_transaction(self) -> Error {
        match self {
            Error::TransactionFailure(_) => self,
            other => Error::TransactionFailure(Box::new(other)),
        }
    }

    /// Maps a uniqueness violation on insert to [`Error::Conflict`].
    pub(crate) fn on_insert(err: rusqlite::Error, entity: &'static str, key: &str) -> Error {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
                Error::Conflict { entity, key: key.to_string() }
            }
            _ => Error::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_skips_transaction_wrappers() {
        let err = Error::Conflict { entity: "Project", key: "alpha".into() }.in_transaction().in_transaction();
        assert!(matches!(err, Error::TransactionFailure(_)));
        assert!(err.is_conflict());
        assert!(matches!(err.cause(), Error::Conflict { key, .. } if key == "alpha"));
    }

    #[test]
    fn constraint_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');").unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(Error::on_insert(err, "T", "a").is_conflict());
    }
}
