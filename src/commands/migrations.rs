use crate::{
    db::migrations::{get_db_version, needs_migration, MigrationManager},
    libs::{config::Config, messages::Message, view::View},
    msg_info, msg_print,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct MigrationsArgs {
    #[command(subcommand)]
    command: MigrationsCommand,
}

#[derive(Debug, Subcommand)]
enum MigrationsCommand {
    /// Show current database version
    Status,
    /// Show migration history
    History,
    /// Apply pending migrations
    Run,
}

pub fn cmd(args: MigrationsArgs) -> Result<()> {
    let db = Config::read()?.db()?;
    let mut conn = db.connect()?;
    msg_print!(Message::DatabaseLocation(db.location().display().to_string()));

    match args.command {
        MigrationsCommand::Status => {
            let manager = MigrationManager::new();
            msg_print!(Message::DbVersion(get_db_version(&conn)?));
            msg_print!(Message::LatestVersion(manager.latest_version()));
            if needs_migration(&conn)? {
                msg_info!(Message::MigrationsPending);
            }
        }
        MigrationsCommand::History => {
            let manager = MigrationManager::new();
            manager.run_migrations(&mut conn)?;
            let history = manager.get_migration_history(&conn)?;
            if history.is_empty() {
                msg_info!(Message::NoMigrationHistory);
            } else {
                msg_print!(Message::MigrationHistoryHeader, true);
                View::migrations(&history);
            }
        }
        MigrationsCommand::Run => {
            MigrationManager::new().run_migrations(&mut conn)?;
            msg_print!(Message::DbVersion(get_db_version(&conn)?));
        }
    }

    Ok(())
}
