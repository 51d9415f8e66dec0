use super::open_service;
use crate::{libs::messages::Message, msg_success};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Directory holding trackedtask.csv, activity.csv and trackedtask_activity.csv
    dir: PathBuf,
}

pub async fn cmd(args: ImportArgs) -> Result<()> {
    let service = open_service().await?;
    let rows = service.import_from(&args.dir)?;
    msg_success!(Message::ImportSuccess(rows, args.dir.display().to_string()));
    service.close();
    Ok(())
}
