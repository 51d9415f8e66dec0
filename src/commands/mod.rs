pub mod export;
pub mod import;
pub mod init;
pub mod label;
pub mod migrations;
pub mod report;
pub mod start;
pub mod stop;
pub mod tasks;

use crate::db::session::Entity;
use crate::libs::config::Config;
use crate::libs::external::TaskView;
use crate::libs::formatter::parse_datetime;
use crate::libs::logging::{init_logging, LoggingConfig};
use crate::libs::messages::Message;
use crate::libs::service::{now, Timekeeper};
use crate::libs::task::{Task, TaskRef};
use crate::{msg_error, msg_error_anyhow};
use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Start working on a task")]
    Start(start::StartArgs),
    #[command(about = "Stop working on a task")]
    Stop(stop::StopArgs),
    #[command(about = "List tracked tasks")]
    Tasks(tasks::TasksArgs),
    #[command(about = "Show the weekly time sheet")]
    Report(report::ReportArgs),
    #[command(about = "Manage activity labels")]
    Label(label::LabelArgs),
    #[command(about = "Export tasks and activities to CSV files", arg_required_else_help = true)]
    Export(export::ExportArgs),
    #[command(about = "Merge tasks and activities from CSV files", arg_required_else_help = true)]
    Import(import::ImportArgs),
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Show database schema version and history")]
    Migrations(migrations::MigrationsArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    /// Print diagnostic logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        init_logging(LoggingConfig::from_args(cli.verbose));
        match cli.command {
            Commands::Start(args) => start::cmd(args).await,
            Commands::Stop(args) => stop::cmd(args).await,
            Commands::Tasks(args) => tasks::cmd(args).await,
            Commands::Report(args) => report::cmd(args).await,
            Commands::Label(args) => label::cmd(args).await,
            Commands::Export(args) => export::cmd(args).await,
            Commands::Import(args) => import::cmd(args).await,
            Commands::Init(args) => init::cmd(args),
            Commands::Migrations(args) => migrations::cmd(args),
        }
    }
}

/// Identifies a task on the command line.
#[derive(Debug, Args)]
pub struct TaskArgs {
    /// Repository the task lives in, `local` for local tasks
    repository: String,

    /// Id of the task within its repository
    id: String,

    /// Task title; kept from the stored task when omitted
    #[arg(short, long)]
    summary: Option<String>,

    #[arg(long)]
    url: Option<String>,

    /// Project to file a new task under
    #[arg(short, long)]
    project: Option<String>,

    /// Project type for a new project, defaults to the repository
    #[arg(short, long)]
    kind: Option<String>,
}

impl TaskArgs {
    fn view(&self) -> TaskView {
        let mut view = TaskView::new(&self.repository, &self.id, self.summary.clone().unwrap_or_default());
        view.url = self.url.clone();
        view.project = self.project.clone();
        view.kind = self.kind.clone();
        view
    }

    /// Looks the task up, creating it when first seen.
    pub fn resolve(&self, service: &Timekeeper) -> Result<TaskRef> {
        let mut view = self.view();
        if self.summary.is_none() || view.url.is_none() {
            let id = service.task_id(&view);
            match service.with_unit_of_work(|uow| Task::find(uow, &id))? {
                Some(stored) => {
                    if self.summary.is_none() {
                        view.summary = stored.summary;
                    }
                    if view.url.is_none() {
                        view.url = stored.url;
                    }
                }
                None if self.summary.is_none() => view.summary = self.id.clone(),
                None => {}
            }
        }
        Ok(service.get_or_link_task(&view)?)
    }
}

/// Opens the configured store. A config without a local uuid is given the
/// one the store uses, so later runs agree on local task ids.
pub async fn open_service() -> Result<Timekeeper> {
    let mut config = Config::read()?;
    let service = Timekeeper::spawn(config.clone())?;
    if let Err(e) = service.ready().await {
        msg_error!(Message::DatabaseUnavailable(service.location().display().to_string()));
        return Err(e.into());
    }
    if config.local_uuid.is_none() {
        config.local_uuid = service.local_uuid().map(str::to_string);
        config.save()?;
    }
    Ok(service)
}

pub fn parse_at(at: Option<&str>) -> Result<NaiveDateTime> {
    match at {
        Some(value) => parse_datetime(value).ok_or_else(|| msg_error_anyhow!(Message::InvalidDateTime(value.to_string()))),
        None => Ok(now()),
    }
}
