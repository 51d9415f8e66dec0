//! Configuration for the timekeeper service.
//!
//! Settings live in `config.json` inside the platform data directory:
//!
//! - **Windows**: `%LOCALAPPDATA%\timekeeper\timekeeper\config.json`
//! - **macOS**: `~/Library/Application Support/timekeeper/timekeeper/config.json`
//! - **Linux**: `~/.local/share/timekeeper/timekeeper/config.json`
//!
//! A missing file means defaults. The `TIMEKEEPER_DB` environment variable
//! overrides whatever database location the file names.
//!
//! ```rust,no_run
//! use timekeeper::libs::config::{Config, DatabaseLocation};
//!
//! let mut config = Config::read()?;
//! config.database.location = DatabaseLocation::Workspace;
//! config.workspace = Some("/home/me/project".into());
//! config.save()?;
//! # Ok::<(), timekeeper::libs::error::Error>(())
//! ```

use super::data_storage::DataStorage;
use super::error::{Error, Result};
use crate::db::db::{Db, DB_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable naming a database file that overrides the config.
pub const DB_ENV_VAR: &str = "TIMEKEEPER_DB";

/// Directory created inside a workspace for a workspace-local database.
pub const WORKSPACE_DIR: &str = ".timekeeper";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseLocation {
    /// One database per user in the data directory.
    #[default]
    Shared,
    /// One database per workspace.
    Workspace,
    /// An explicit file.
    Path,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub location: DatabaseLocation,

    /// Database file, used with [`DatabaseLocation::Path`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How long a writer waits for a competing transaction, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            location: DatabaseLocation::Shared,
            path: None,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Repository URLs this installation knows about. Tasks from other
    /// repositories are reported as unlinked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,

    /// Disambiguates local task ids between installations. When unset the
    /// store generates one and keeps it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_uuid: Option<String>,
}

impl Config {
    pub fn read() -> Result<Config> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        Self::read_from(&path)
    }

    pub fn read_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let config_str = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&config_str)?)
    }

    pub fn save(&self) -> Result<()> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, self)?;
        Ok(())
    }

    /// Config pointing at an explicit database file, handy for tools and tests.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                location: DatabaseLocation::Path,
                path: Some(path.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Resolves where the database file lives.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = env::var_os(DB_ENV_VAR).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        match self.database.location {
            DatabaseLocation::Shared => Ok(DataStorage::new().get_path(DB_FILE_NAME)?),
            DatabaseLocation::Workspace => {
                let workspace = match &self.workspace {
                    Some(dir) => dir.clone(),
                    None => env::current_dir()?,
                };
                Ok(workspace.join(WORKSPACE_DIR).join(DB_FILE_NAME))
            }
            DatabaseLocation::Path => self.database.path.clone().ok_or_else(|| Error::ConnectionFailure {
                location: "<unset>".to_string(),
                reason: "database location is 'path' but no path is configured".to_string(),
            }),
        }
    }

    pub fn db(&self) -> Result<Db> {
        Ok(Db::new(self.database_path()?, Duration::from_millis(self.database.busy_timeout_ms)))
    }
}
