use std::time::Duration;

use allot_core::{AlertQueue, Clock, Database, Event, SelectionMode, TaskTimer};
use clap::Subcommand;
use tracing::{debug, warn};

use super::{print_json, CmdResult, Context};

const COMPLETION_KEY: &str = "completion_visible";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start timing the next task with minutes left
    Start {
        /// Task selection: priority-order or highest-allocation
        #[arg(long)]
        mode: Option<SelectionMode>,
    },
    /// Stop and credit the elapsed minutes
    Stop,
    /// Credit the elapsed minutes and mark the task done for today
    Complete,
    /// Drop the running session without crediting anything
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Complete the session if its end time has passed
    Check,
    /// Hide the completion notice
    Dismiss,
    /// Count down in the foreground until the session ends or Ctrl-C
    Watch,
}

type Timer<'a> = TaskTimer<&'a Database, &'a Database, &'a AlertQueue, &'a dyn Clock>;

fn print_event(event: Option<Event>) -> CmdResult {
    match event {
        Some(event) => {
            debug!("{}", event.summary());
            print_json(&event)
        }
        None => Ok(()),
    }
}

fn save_completion_flag(db: &Database, timer: &Timer<'_>) -> CmdResult {
    let value = if timer.completion_visible() { "true" } else { "false" };
    db.kv_set(COMPLETION_KEY, value)?;
    Ok(())
}

pub fn run(action: TimerAction, ctx: &Context) -> CmdResult {
    if matches!(action, TimerAction::Watch) && ctx.now.is_some() {
        return Err("--now cannot be used with watch".into());
    }

    let config = ctx.load_config()?;
    let db = ctx.open_db()?;
    let alerts = ctx.alert_queue(&config)?;
    let clock = ctx.clock();

    let completion_visible = db.kv_get(COMPLETION_KEY)?.as_deref() == Some("true");
    let mode = match &action {
        TimerAction::Start { mode: Some(mode) } => *mode,
        _ => config.timer.selection_mode,
    };
    let mut timer: Timer<'_> = TaskTimer::new(&db, &db, &alerts, clock.as_ref())
        .with_mode(mode)
        .with_completion_visible(completion_visible);

    print_event(timer.restore()?)?;

    match action {
        TimerAction::Start { .. } => {
            let event = timer.start()?;
            if event.is_none() && !timer.is_running() {
                println!("no task has time left today");
            }
            print_event(event)?;
        }
        TimerAction::Stop => print_event(timer.stop()?)?,
        TimerAction::Complete => print_event(timer.complete()?)?,
        TimerAction::Reset => print_event(timer.reset()?)?,
        TimerAction::Status => print_json(&timer.snapshot())?,
        TimerAction::Check => print_event(timer.check_and_complete_if_expired()?)?,
        TimerAction::Dismiss => {
            timer.dismiss_completion();
            println!("ok");
        }
        TimerAction::Watch => watch(&mut timer)?,
    }

    save_completion_flag(&db, &timer)
}

fn watch(timer: &mut Timer<'_>) -> CmdResult {
    if !timer.is_running() {
        println!("timer is idle");
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()?;

    rt.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(event) = timer.check_and_complete_if_expired()? {
                        eprintln!();
                        print_event(Some(event))?;
                        break;
                    }
                    let (h, m, s) = timer.remaining();
                    eprint!("\r{h:02}:{m:02}:{s:02} left");
                }
                res = &mut ctrl_c => {
                    if let Err(e) = res {
                        warn!(error = %e, "could not listen for Ctrl-C");
                    }
                    eprintln!();
                    println!("detached; the session keeps running");
                    break;
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
