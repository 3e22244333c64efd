use allot_core::storage::{AlertKind, AlertRecord};
use chrono::Utc;
use clap::Subcommand;

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum AlertsAction {
    /// List scheduled alerts (pending only by default)
    List {
        /// Include cancelled alerts
        #[arg(long, conflicts_with = "due")]
        all: bool,
        /// Only alerts whose fire time has passed
        #[arg(long)]
        due: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: AlertsAction, ctx: &Context) -> CmdResult {
    let config = ctx.load_config()?;
    let queue = ctx.alert_queue(&config)?;

    match action {
        AlertsAction::List { all, due, json } => {
            let records: Vec<AlertRecord> = if all {
                queue.records()?
            } else if due {
                queue.due(ctx.now().with_timezone(&Utc))?
            } else {
                queue.pending()?
            };
            if json {
                print_json(&records)?;
                return Ok(());
            }
            if records.is_empty() {
                println!("no alerts");
            }
            for r in &records {
                let mark = if r.cancelled { " (cancelled)" } else { "" };
                println!(
                    "{}  {:<10}  {}{}",
                    r.fire_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    match r.kind {
                        AlertKind::Completion => "completion",
                        AlertKind::FollowUp => "follow-up",
                    },
                    r.title,
                    mark
                );
            }
        }
    }
    Ok(())
}
