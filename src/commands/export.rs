use super::open_service;
use crate::{libs::messages::Message, msg_success};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Directory to write the CSV files into; created if missing
    dir: PathBuf,
}

pub async fn cmd(args: ExportArgs) -> Result<()> {
    let service = open_service().await?;
    let rows = service.export_to(&args.dir)?;
    msg_success!(Message::ExportSuccess(rows, args.dir.display().to_string()));
    service.close();
    Ok(())
}
