use super::open_service;
use crate::{
    libs::{messages::Message, report::WeekReport, service::now, task::Task, view::View},
    msg_info, msg_print,
};
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use clap::Args;

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// First day of the week to report (YYYY-MM-DD), defaults to this Monday
    #[arg(short, long)]
    date: Option<NaiveDate>,
}

pub async fn cmd(args: ReportArgs) -> Result<()> {
    let now = now();
    let start = args.date.unwrap_or_else(|| {
        let today = now.date();
        today - Duration::days(today.weekday().num_days_from_monday() as i64)
    });

    let service = open_service().await?;
    let tasks: Vec<Task> = service
        .list_tasks_active_in_week_at(start, now)?
        .iter()
        .map(|task| task.lock().clone())
        .collect();
    let report = WeekReport::build(&tasks, start, now);

    if report.is_empty() {
        msg_info!(Message::TasksNotFound);
    } else {
        let end = start + Duration::days(6);
        msg_print!(Message::WeekReportHeader(start.to_string(), end.to_string()), true);
        View::week(&report);
    }
    service.close();
    Ok(())
}
