use allot_core::allocation::{plan, AllocationEngine, AllocationSettings};
use allot_core::storage::Database;
use allot_core::{BudgetWindow, Config, MemoryStore, Task, TaskStore};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use proptest::prelude::*;
use tempfile::TempDir;

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T18:00:00+09:00").unwrap()
}

fn window(minutes: i64) -> BudgetWindow {
    BudgetWindow::new(now(), now() + Duration::minutes(minutes))
}

prop_compose! {
    fn arb_task()(
        days in -30i64..60,
        school in any::<bool>(),
        completed in prop::bool::weighted(0.15),
        done_today in prop::bool::weighted(0.2),
        current in 0u32..600,
        worked in 0u32..600,
    ) -> Task {
        let due = now().date_naive() + Duration::days(days);
        let mut t = Task::new("t", due).with_school(school).with_minutes(current, worked);
        t.is_completed = completed;
        t.is_done_for_today = done_today;
        t
    }
}

proptest! {
    #[test]
    fn allocation_never_exceeds_budget(
        tasks in prop::collection::vec(arb_task(), 0..12),
        minutes in -300i64..1440,
        multiplier in prop_oneof![Just(0.0), 0.0f64..10.0, 10.0f64..1.0e6],
    ) {
        let settings = AllocationSettings { school_multiplier: multiplier, ..AllocationSettings::default() };
        let p = plan(&tasks, &window(minutes), &settings);
        if !p.skipped {
            prop_assert!(p.allocated_minutes() <= p.total_work_minutes.max(0));
        }
    }

    #[test]
    fn excluded_tasks_end_at_zero(tasks in prop::collection::vec(arb_task(), 0..12)) {
        let store = MemoryStore::with_tasks(tasks);
        AllocationEngine::default().run(&store, &window(240)).unwrap();
        for t in store.tasks() {
            if t.is_completed || t.is_done_for_today {
                prop_assert_eq!(t.current_minutes, 0);
            }
        }
    }

    #[test]
    fn allocation_is_idempotent_without_worked_time(
        tasks in prop::collection::vec(arb_task(), 0..12),
        minutes in 0i64..1440,
    ) {
        let tasks: Vec<Task> = tasks.into_iter().map(|t| { let c = t.current_minutes; t.with_minutes(c, 0) }).collect();
        let store = MemoryStore::with_tasks(tasks);
        let engine = AllocationEngine::default();
        engine.run(&store, &window(minutes)).unwrap();
        let first: Vec<u32> = store.tasks().iter().map(|t| t.current_minutes).collect();
        engine.run(&store, &window(minutes)).unwrap();
        let second: Vec<u32> = store.tasks().iter().map(|t| t.current_minutes).collect();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn rerun_reclaims_against_the_last_written_budget() {
    let today = now().date_naive();
    let store = MemoryStore::with_tasks(vec![
        Task::new("gym", today).with_school(false).with_minutes(60, 50),
        Task::new("essay", today).with_order(1),
    ]);
    let engine = AllocationEngine::default();
    let minutes = |s: &MemoryStore| s.tasks().iter().map(|t| t.current_minutes).collect::<Vec<_>>();

    let first = engine.run(&store, &window(10)).unwrap();
    assert_eq!(first.reclaimed_minutes, 50);
    assert_eq!(first.total_work_minutes, 60);
    assert_eq!(minutes(&store), [5, 54]);

    let second = engine.run(&store, &window(10)).unwrap();
    assert_eq!(second.reclaimed_minutes, 5);
    assert_eq!(second.total_work_minutes, 15);
    assert_eq!(minutes(&store), [1, 13]);
    assert!(second.allocated_minutes() <= second.total_work_minutes);
}

#[test]
fn all_done_for_today_leaves_zeros() {
    let due = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    let tasks: Vec<Task> = (0..3)
        .map(|i| {
            let mut t = Task::new(format!("t{i}"), due).with_order(i).with_minutes(30, 0);
            t.is_done_for_today = true;
            t
        })
        .collect();
    let store = MemoryStore::with_tasks(tasks);
    let p = AllocationEngine::default().run(&store, &window(300)).unwrap();
    assert!(p.skipped);
    assert!(store.tasks().iter().all(|t| t.current_minutes == 0));
}

#[test]
fn allocation_round_trips_through_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("allot.db");
    let today = now().date_naive();
    {
        let db = Database::open_at(&path).unwrap();
        db.save_tasks(&[
            Task::new("essay", today),
            Task::new("gym", today + Duration::days(5)).with_school(false).with_order(1),
        ])
        .unwrap();

        let mut config = Config::default();
        config.schedule.sleep_time = "22:00".parse().unwrap();
        config.schedule.offset_minutes = 20;
        let window = BudgetWindow::resolve(now(), &config.schedule);
        let engine = AllocationEngine::new(config.allocation_settings()).unwrap();
        let p = engine.run(&db, &window).unwrap();
        assert_eq!(p.total_work_minutes, 4 * 60 - 20);
    }

    let db = Database::open_at(&path).unwrap();
    let tasks = db.list_tasks().unwrap();
    assert_eq!(tasks[0].name, "essay");
    assert_eq!(tasks[0].current_minutes, 217);
    assert_eq!(tasks[1].current_minutes, 2);
}
