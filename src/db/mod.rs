//! Persistence layer on SQLite.
//!
//! Repositories borrow the connection of the current unit of work and keep
//! their SQL next to them. Schema changes go through [`migrations`].
//!
//! ```rust,no_run
//! use timekeeper::db::{db::Db, session::SessionManager, tasks::Tasks};
//! use std::time::Duration;
//!
//! let sessions = SessionManager::new(Db::new("timekeeper.db", Duration::from_secs(5)));
//! let tasks = sessions.with_unit_of_work(|uow| Tasks::new(uow.conn()).list())?;
//! # Ok::<(), timekeeper::libs::error::Error>(())
//! ```

/// Connection settings and opening.
pub mod db;

/// Versioned schema changes and their history.
pub mod migrations;

/// Per-worker units of work with nested transactions.
pub mod session;

/// Activity rows and their ownership links.
pub mod activities;

pub mod labels;

/// Project and project type catalogs.
pub mod projects;

/// Per-store values such as the local workspace uuid.
pub mod settings;

/// Tracked tasks with their activities.
pub mod tasks;
