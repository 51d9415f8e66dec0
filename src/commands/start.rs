use super::{open_service, parse_at, TaskArgs};
use crate::{
    libs::{formatter::format_datetime, messages::Message},
    msg_info, msg_success,
};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct StartArgs {
    #[command(flatten)]
    task: TaskArgs,

    /// Start time as `YYYY-MM-DD HH:MM`, defaults to now
    #[arg(long)]
    at: Option<String>,
}

pub async fn cmd(args: StartArgs) -> Result<()> {
    let at = parse_at(args.at.as_deref())?;
    let service = open_service().await?;
    let task = args.task.resolve(&service)?;
    let was_active = task.lock().is_active();
    let activity = service.start_activity_at(&task, at)?;
    let id = task.lock().id.to_string();

    if was_active {
        msg_info!(Message::ActivityAlreadyRunning(id, format_datetime(&activity.start)));
    } else {
        msg_success!(Message::ActivityStarted(id, format_datetime(&activity.start)));
    }
    service.close();
    Ok(())
}
