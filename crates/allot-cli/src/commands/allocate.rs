use allot_core::allocation::check_school_multiplier;
use allot_core::{AllocationEngine, AllocationPlan, BudgetWindow, Rollover, TaskStore, TimeOfDay};
use clap::Args;
use tracing::info;

use super::{print_json, CmdResult, Context};

#[derive(Args)]
pub struct AllocateArgs {
    /// Sleep deadline for this run, HH:MM (default: schedule.sleep_time)
    #[arg(long)]
    sleep: Option<TimeOfDay>,
    /// Minutes to hold back from the budget
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<i64>,
    /// Extra minutes to hold back
    #[arg(long, allow_hyphen_values = true)]
    extra: Option<i64>,
    /// Put the deadline on tomorrow even if it has not passed yet
    #[arg(long, conflicts_with = "today")]
    tomorrow: bool,
    /// Keep the deadline on today even if it has passed
    #[arg(long)]
    today: bool,
    /// Weight for non-school tasks, a finite number >= 0
    #[arg(long, allow_hyphen_values = true, value_parser = parse_multiplier)]
    school_multiplier: Option<f64>,
    /// Compute and print without saving
    #[arg(long)]
    dry_run: bool,
    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

fn parse_multiplier(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    check_school_multiplier(value).map_err(|e| e.to_string())
}

fn print_plan(plan: &AllocationPlan) {
    println!(
        "window {} -> {}  ({} min, +{} reclaimed, {} to split)",
        plan.window.start.format("%H:%M"),
        plan.window.deadline.format("%a %H:%M"),
        plan.raw_minutes,
        plan.reclaimed_minutes,
        plan.total_work_minutes
    );
    for a in &plan.allocations {
        let days = a
            .days_until_due
            .map(|d| format!("{d:+}d"))
            .unwrap_or_else(|| "-".to_string());
        let minutes = if a.excluded {
            "excluded".to_string()
        } else {
            format!("{} min", a.minutes)
        };
        println!("  {:<28} {:>5}  {:>5.1}%  {}", a.name, days, a.share * 100.0, minutes);
    }
}

pub fn run(args: AllocateArgs, ctx: &Context) -> CmdResult {
    let mut config = ctx.load_config()?;
    let schedule = &mut config.schedule;
    if let Some(sleep) = args.sleep {
        schedule.sleep_time = sleep;
    }
    if let Some(offset) = args.offset {
        schedule.offset_minutes = offset;
    }
    if let Some(extra) = args.extra {
        schedule.extra_minutes = extra;
    }
    if args.tomorrow {
        schedule.sleep_tomorrow = true;
    } else if args.today {
        schedule.sleep_tomorrow = false;
        schedule.rollover = Rollover::Today;
    }
    if let Some(m) = args.school_multiplier {
        config.allocation.school_multiplier = m;
    }

    let window = BudgetWindow::resolve(ctx.now(), &config.schedule);
    let engine = AllocationEngine::new(config.allocation_settings())?;
    let db = ctx.open_db()?;

    let plan = if args.dry_run {
        engine.plan(&db.list_tasks()?, &window)
    } else {
        engine.run(&db, &window)?
    };
    info!(dry_run = args.dry_run, skipped = plan.skipped, "allocation finished");

    if args.json {
        print_json(&plan)?;
    } else {
        print_plan(&plan);
        println!("{}", plan.to_event().summary());
    }
    Ok(())
}
