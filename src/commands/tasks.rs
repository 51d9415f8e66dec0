use super::open_service;
use crate::{
    libs::{messages::Message, service::now, task::Task, view::View},
    msg_info, msg_print,
};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

#[derive(Debug, Args)]
pub struct TasksArgs {
    /// Only tasks with time in the seven days from this date (YYYY-MM-DD)
    #[arg(short, long)]
    week: Option<NaiveDate>,

    /// Only tasks of this project
    #[arg(short, long, conflicts_with = "week")]
    project: Option<String>,
}

pub async fn cmd(args: TasksArgs) -> Result<()> {
    let service = open_service().await?;
    let (header, tasks) = match (&args.week, &args.project) {
        (Some(week), _) => (Message::TasksWeekHeader(week.to_string()), service.list_tasks_active_in_week(*week)?),
        (None, Some(project)) => (Message::TasksProjectHeader(project.clone()), service.tasks_in_project(project)?),
        (None, None) => (Message::TasksHeader, service.list_all_tasks()?),
    };
    let tasks: Vec<Task> = tasks.iter().map(|task| task.lock().clone()).collect();

    if tasks.is_empty() {
        msg_info!(Message::TasksNotFound);
    } else {
        msg_print!(header, true);
        View::tasks(&tasks, now());
    }
    service.close();
    Ok(())
}
