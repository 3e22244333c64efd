//! Task management commands for CLI.

use allot_core::task::{daily, ordering, parse_due_date};
use allot_core::{Database, StoreError, Task, TaskStore};
use chrono::NaiveDate;
use clap::Subcommand;

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task (school by default)
    Add {
        /// Task name
        name: String,
        /// Due date, YYYY-MM-DD
        #[arg(long, value_parser = parse_due)]
        due: NaiveDate,
        /// Mark as a school task (default)
        #[arg(long, overrides_with = "no_school")]
        school: bool,
        /// Mark as a personal task
        #[arg(long)]
        no_school: bool,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Rank to insert at (default: bottom)
        #[arg(long)]
        at: Option<usize>,
    },
    /// List tasks in rank order
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one task as JSON
    Get {
        /// Task ID or unique prefix
        id: String,
    },
    /// Edit task fields
    Update {
        /// Task ID or unique prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_due)]
        due: Option<NaiveDate>,
        #[arg(long)]
        school: Option<bool>,
        #[arg(long)]
        notes: Option<String>,
        /// Today's budget in minutes
        #[arg(long)]
        minutes: Option<u32>,
        /// Minutes worked today
        #[arg(long)]
        worked: Option<u32>,
    },
    /// Delete a task (undo with undo-delete)
    Delete {
        /// Task ID or unique prefix
        id: String,
    },
    /// Bring back the last deleted task at the bottom of the list
    UndoDelete,
    /// Move the task at rank FROM so it lands before rank TO
    Move { from: usize, to: usize },
    /// Mark a task done for today
    DoneToday {
        /// Task ID or unique prefix
        id: String,
        /// Clear the flag instead
        #[arg(long)]
        undo: bool,
    },
    /// Mark a task permanently finished
    Finish {
        /// Task ID or unique prefix
        id: String,
        /// Reopen instead
        #[arg(long)]
        undo: bool,
    },
    /// Reset done-for-today and worked minutes on every open task
    ClearDaily,
    /// Mark every open personal task done for today
    NonSchoolDone,
}

fn parse_due(s: &str) -> Result<NaiveDate, String> {
    parse_due_date(s).map_err(|e| e.to_string())
}

/// Accepts a full id or a prefix matching exactly one task.
fn resolve_id(db: &Database, id: &str) -> Result<String, Box<dyn std::error::Error>> {
    if db.get_task(id)?.is_some() {
        return Ok(id.to_string());
    }
    let matches: Vec<Task> = db
        .list_tasks()?
        .into_iter()
        .filter(|t| t.id.starts_with(id))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => Err(StoreError::NotFound(id.to_string()).into()),
        _ => Err(format!("task id prefix '{id}' is ambiguous").into()),
    }
}

fn print_table(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    println!(
        "{:>3}  {:<28} {:<10}  {:<8} {:>9}  {:<8}  ID",
        "#", "NAME", "DUE", "KIND", "WORK/PLAN", "STATUS"
    );
    for t in tasks {
        let status = if t.is_completed {
            "finished"
        } else if t.is_done_for_today {
            "done"
        } else {
            "open"
        };
        let kind = if t.is_for_school { "school" } else { "personal" };
        let mut name = t.name.clone();
        if name.chars().count() > 28 {
            name = name.chars().take(27).collect::<String>() + "…";
        }
        println!(
            "{:>3}  {:<28} {:<10}  {:<8} {:>4}/{:<4}  {:<8}  {}",
            t.temporary_order,
            name,
            t.due_date,
            kind,
            t.completed_time,
            t.current_minutes,
            status,
            &t.id[..8.min(t.id.len())]
        );
    }
}

pub fn run(action: TaskAction, ctx: &Context) -> CmdResult {
    let db = ctx.open_db()?;

    match action {
        TaskAction::Add {
            name,
            due,
            school: _,
            no_school,
            notes,
            at,
        } => {
            let mut task = Task::new(name, due).with_school(!no_school);
            if let Some(notes) = notes {
                task = task.with_notes(notes);
            }
            let task = ordering::add_task(&db, task, at)?;
            println!("Task created: {}", task.id);
            print_json(&task)?;
        }
        TaskAction::List { json } => {
            let tasks = db.list_tasks()?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(&tasks);
            }
        }
        TaskAction::Get { id } => {
            let id = resolve_id(&db, &id)?;
            match db.get_task(&id)? {
                Some(task) => print_json(&task)?,
                None => return Err(StoreError::NotFound(id).into()),
            }
        }
        TaskAction::Update {
            id,
            name,
            due,
            school,
            notes,
            minutes,
            worked,
        } => {
            let id = resolve_id(&db, &id)?;
            let mut task = db
                .get_task(&id)?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if let Some(name) = name {
                task.name = name;
            }
            if let Some(due) = due {
                task.due_date = due;
            }
            if let Some(school) = school {
                task.is_for_school = school;
            }
            if let Some(notes) = notes {
                task.notes = notes;
            }
            if let Some(minutes) = minutes {
                task.current_minutes = minutes;
            }
            if let Some(worked) = worked {
                task.completed_time = worked;
            }
            db.save_tasks(std::slice::from_ref(&task))?;
            println!("Task updated:");
            print_json(&task)?;
        }
        TaskAction::Delete { id } => {
            let id = resolve_id(&db, &id)?;
            let removed = ordering::delete_task(&db, &id)?;
            db.remember_deleted(&removed)?;
            println!("Task deleted: {id}");
        }
        TaskAction::UndoDelete => match db.take_deleted()? {
            Some(task) => {
                let task = ordering::restore_task(&db, task)?;
                println!("Task restored: {}", task.id);
                print_json(&task)?;
            }
            None => println!("nothing to undo"),
        },
        TaskAction::Move { from, to } => {
            ordering::move_task(&db, from, to)?;
            print_table(&db.list_tasks()?);
        }
        TaskAction::DoneToday { id, undo } => {
            let id = resolve_id(&db, &id)?;
            let task = daily::set_done_for_today(&db, &id, !undo)?;
            print_json(&task)?;
        }
        TaskAction::Finish { id, undo } => {
            let id = resolve_id(&db, &id)?;
            let task = daily::set_completed(&db, &id, !undo)?;
            print_json(&task)?;
        }
        TaskAction::ClearDaily => {
            let changed = daily::clear_daily_progress(&db)?;
            println!("cleared daily progress on {changed} task(s)");
        }
        TaskAction::NonSchoolDone => {
            let changed = daily::mark_non_school_done_for_today(&db)?;
            println!("marked {changed} personal task(s) done for today");
        }
    }
    Ok(())
}
