use super::{open_service, parse_at, TaskArgs};
use crate::{
    libs::{formatter::format_duration, messages::Message, service::now},
    msg_info, msg_success,
};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct StopArgs {
    #[command(flatten)]
    task: TaskArgs,

    /// End time as `YYYY-MM-DD HH:MM`, defaults to now
    #[arg(long)]
    at: Option<String>,

    /// Open a new activity right away, e.g. to split the day
    #[arg(short, long)]
    reactivate: bool,
}

pub async fn cmd(args: StopArgs) -> Result<()> {
    let at = match args.at.as_deref() {
        Some(value) => Some(parse_at(Some(value))?),
        None => None,
    };
    let service = open_service().await?;
    let task = args.task.resolve(&service)?;
    let id = task.lock().id.to_string();

    match service.end_activity(&task, at, args.reactivate)? {
        Some(activity) => {
            msg_success!(Message::ActivityEnded(id.clone(), format_duration(&activity.duration(now()))));
            if args.reactivate {
                msg_info!(Message::ActivityReactivated(id));
            }
        }
        None => msg_info!(Message::TaskIdle(id)),
    }
    service.close();
    Ok(())
}
