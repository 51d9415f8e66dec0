//! Writes the configuration file.
//!
//! Options not given on the command line keep their current value.

use crate::{
    libs::{
        config::{Config, DatabaseLocation, CONFIG_FILE_NAME},
        data_storage::DataStorage,
        messages::Message,
    },
    msg_print, msg_success,
};
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Location {
    Shared,
    Workspace,
    Path,
}

impl From<Location> for DatabaseLocation {
    fn from(location: Location) -> Self {
        match location {
            Location::Shared => DatabaseLocation::Shared,
            Location::Workspace => DatabaseLocation::Workspace,
            Location::Path => DatabaseLocation::Path,
        }
    }
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Where the database lives
    #[arg(short, long, value_enum)]
    location: Option<Location>,

    /// Database file for `--location path`
    #[arg(long)]
    path: Option<PathBuf>,

    /// Workspace directory for `--location workspace`
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Known repository URL; repeat for several
    #[arg(short, long = "repository")]
    repositories: Vec<String>,

    /// Milliseconds a writer waits for a busy database
    #[arg(long)]
    busy_timeout: Option<u64>,
}

pub fn cmd(args: InitArgs) -> Result<()> {
    let mut config = Config::read()?;
    if let Some(location) = args.location {
        config.database.location = location.into();
    }
    if args.path.is_some() {
        config.database.path = args.path;
    }
    if args.workspace.is_some() {
        config.workspace = args.workspace;
    }
    if !args.repositories.is_empty() {
        config.repositories = args.repositories;
    }
    if let Some(timeout) = args.busy_timeout {
        config.database.busy_timeout_ms = timeout;
    }
    config.save()?;

    let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
    msg_success!(Message::ConfigSaved(path.display().to_string()));
    msg_print!(Message::DatabaseLocation(config.database_path()?.display().to_string()));
    Ok(())
}
