use super::open_service;
use crate::{
    libs::{label::ActivityLabel, messages::Message, view::View},
    msg_info, msg_print, msg_success, msg_warning,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct LabelArgs {
    #[command(subcommand)]
    command: LabelCommand,
}

#[derive(Debug, Subcommand)]
enum LabelCommand {
    /// Add a label or change its color
    Add {
        name: String,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Remove a label and clear it from all activities
    Remove { name: String },
    /// List all labels
    List,
}

pub async fn cmd(args: LabelArgs) -> Result<()> {
    let service = open_service().await?;
    match args.command {
        LabelCommand::Add { name, color } => {
            service.set_label(&ActivityLabel::new(name.clone(), color))?;
            msg_success!(Message::LabelSaved(name));
        }
        LabelCommand::Remove { name } => {
            if service.remove_label(&name)? {
                msg_success!(Message::LabelRemoved(name));
            } else {
                msg_warning!(Message::LabelNotFound(name));
            }
        }
        LabelCommand::List => {
            let labels = service.list_labels()?;
            if labels.is_empty() {
                msg_info!(Message::NoLabels);
            } else {
                msg_print!(Message::LabelsHeader, true);
                View::labels(&labels);
            }
        }
    }
    service.close();
    Ok(())
}
