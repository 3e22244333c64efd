use allot_core::time::{DaySplits, SplitTimes};
use chrono::{DateTime, FixedOffset};
use clap::Args;

use super::{print_json, CmdResult, Context};

#[derive(Args)]
pub struct SplitsArgs {
    /// Print JSON
    #[arg(long)]
    json: bool,
}

fn hm(t: &DateTime<FixedOffset>) -> String {
    t.format("%a %H:%M").to_string()
}

pub fn run(args: SplitsArgs, ctx: &Context) -> CmdResult {
    let config = ctx.load_config()?;
    let splits = DaySplits::compute(&ctx.now(), &SplitTimes::from(&config.schedule));

    if args.json {
        let mut value = serde_json::to_value(&splits)?;
        if !config.schedule.half_time {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("half_time");
            }
        }
        return print_json(&value);
    }

    println!("wake midpoint  {}", hm(&splits.wake_midpoint));
    println!(
        "sleep          {}{}",
        hm(&splits.sleep),
        if splits.sleeps_next_day { " (next day)" } else { "" }
    );
    println!(
        "thirds         {} | {}",
        hm(&splits.double_split[0]),
        hm(&splits.double_split[1])
    );
    println!(
        "quarters       {} | {} | {}",
        hm(&splits.triple_split[0]),
        hm(&splits.triple_split[1]),
        hm(&splits.triple_split[2])
    );
    if config.schedule.half_time {
        println!("half time      {}", hm(&splits.half_time));
    }
    Ok(())
}
