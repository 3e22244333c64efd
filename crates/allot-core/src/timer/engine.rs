//! Active-task timer.
//!
//! A wall-clock countdown over one task at a time. It does not use internal
//! threads: callers poll `check_and_complete_if_expired()` (from a tick, on
//! resume, or from a scheduler) and every path converges on `complete()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Idle   (stop | complete | reset)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = TaskTimer::new(&db, &db, &alerts, SystemClock);
//! timer.restore()?;          // pick up a session from a previous process
//! timer.start()?;            // Some(Event::TimerStarted) when a task qualified
//! timer.check_and_complete_if_expired()?;
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::session::{SelectionMode, Session};
use crate::error::Result;
use crate::events::Event;
use crate::notify::Notifier;
use crate::storage::{SessionStore, TaskStore};
use crate::task::Task;
use crate::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
}

/// Point-in-time view of the timer for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub mode: SelectionMode,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub remaining_secs: i64,
    pub elapsed_minutes: u32,
    pub completion_visible: bool,
    pub at: DateTime<Utc>,
}

/// Single-session timer over tasks from a [`TaskStore`].
pub struct TaskTimer<T, S, N, C> {
    tasks: T,
    sessions: S,
    notifier: N,
    clock: C,
    mode: SelectionMode,
    session: Option<Session>,
    /// UI signal: show the "task complete" overlay.
    completion_visible: bool,
}

impl<T, S, N, C> TaskTimer<T, S, N, C>
where
    T: TaskStore,
    S: SessionStore,
    N: Notifier,
    C: Clock,
{
    /// Idle timer. Call [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(tasks: T, sessions: S, notifier: N, clock: C) -> Self {
        Self {
            tasks,
            sessions,
            notifier,
            clock,
            mode: SelectionMode::default(),
            session: None,
            completion_visible: false,
        }
    }

    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_completion_visible(mut self, visible: bool) -> Self {
        self.completion_visible = visible;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.session.is_some() {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn completion_visible(&self) -> bool {
        self.completion_visible
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    /// (hours, minutes, seconds) until the session ends; zeros when idle.
    pub fn remaining(&self) -> (i64, i64, i64) {
        let secs = self.remaining_secs();
        (secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// Whole minutes worked in the current session; 0 when idle.
    pub fn elapsed_minutes(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.elapsed_minutes(self.now()))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let s = self.session.as_ref();
        TimerSnapshot {
            state: self.state(),
            mode: self.mode,
            task_id: s.map(|s| s.task_id.clone()),
            task_name: s.map(|s| s.task_name.clone()),
            start_time: s.map(|s| s.start_time),
            end_time: s.map(|s| s.end_time),
            remaining_secs: self.remaining_secs(),
            elapsed_minutes: self.elapsed_minutes(),
            completion_visible: self.completion_visible,
            at: self.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Rebuilds the session persisted by a previous process. A session whose
    /// end time has passed is completed immediately.
    pub fn restore(&mut self) -> Result<Option<Event>> {
        let Some(persisted) = self.sessions.load_session()? else {
            self.session = None;
            return Ok(None);
        };

        let Some(task) = self.find_session_task(&persisted)? else {
            warn!(
                task_id = %persisted.task_id,
                task_name = %persisted.task_name,
                "persisted session refers to a missing task; discarding"
            );
            self.clear()?;
            return Ok(None);
        };

        let session = Session {
            task_id: task.id,
            task_name: task.name,
            ..persisted
        };
        let now = self.now();
        self.session = Some(session.clone());

        if session.is_expired(now) {
            info!(task_id = %session.task_id, end_time = %session.end_time, "session ended while away");
            return self.complete();
        }

        debug!(task_id = %session.task_id, "session restored");
        Ok(Some(Event::TimerRestored {
            remaining_secs: session.remaining(now).num_seconds(),
            task_id: session.task_id,
            task_name: session.task_name,
            end_time: session.end_time,
            at: now,
        }))
    }

    /// Starts a session on the next task. No-op while running or when no task
    /// has budget left.
    pub fn start(&mut self) -> Result<Option<Event>> {
        if self.session.is_some() {
            debug!("start ignored: a session is already running");
            return Ok(None);
        }

        let tasks = self.tasks.list_tasks()?;
        let Some(task) = self.mode.select(&tasks) else {
            info!(mode = %self.mode, "no task has time allocated");
            return Ok(None);
        };
        let remaining = task.remaining_minutes();
        if remaining <= 0 {
            info!(task_id = %task.id, "selected task has no time left");
            return Ok(None);
        }

        let now = self.now();
        let session = Session {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            start_time: now,
            end_time: now + Duration::minutes(remaining),
        };
        self.sessions.save_session(&session)?;
        self.session = Some(session.clone());

        self.cancel_alerts();
        if let Err(e) = self
            .notifier
            .schedule_completion_alert(&session.task_name, session.end_time)
        {
            warn!(error = %e, "could not schedule completion alert");
        }

        info!(task_id = %session.task_id, minutes = remaining, "timer started");
        Ok(Some(Event::TimerStarted {
            planned_minutes: remaining,
            end_time: session.end_time,
            task_id: session.task_id,
            task_name: session.task_name,
            at: now,
        }))
    }

    /// Ends the session and adds the elapsed minutes to the task.
    pub fn stop(&mut self) -> Result<Option<Event>> {
        let Some(session) = self.session.clone() else {
            return Ok(None);
        };
        let now = self.now();
        let elapsed = session.elapsed_minutes(now);
        let task = self.settle(&session, elapsed, false)?;

        let (completed_time, budget_met) = match &task {
            Some(t) => (t.completed_time, t.budget_met()),
            None => (0, false),
        };
        if budget_met {
            self.completion_visible = true;
        }
        self.cancel_alerts();

        info!(task_id = %session.task_id, elapsed, budget_met, "timer stopped");
        Ok(Some(Event::TimerStopped {
            task_id: session.task_id,
            task_name: session.task_name,
            elapsed_minutes: elapsed,
            completed_time,
            budget_met,
            at: now,
        }))
    }

    /// Like `stop`, but also marks the task done for today.
    pub fn complete(&mut self) -> Result<Option<Event>> {
        let Some(session) = self.session.clone() else {
            return Ok(None);
        };
        let now = self.now();
        let elapsed = session.elapsed_minutes(now);
        let task = self.settle(&session, elapsed, true)?;

        self.completion_visible = true;
        self.cancel_alerts();

        info!(task_id = %session.task_id, elapsed, "task completed for today");
        Ok(Some(Event::TimerCompleted {
            task_id: session.task_id,
            task_name: session.task_name,
            elapsed_minutes: elapsed,
            completed_time: task.map(|t| t.completed_time).unwrap_or(0),
            at: now,
        }))
    }

    /// Drops the session without touching any task.
    pub fn reset(&mut self) -> Result<Option<Event>> {
        let was_running = self.session.is_some();
        if was_running {
            self.cancel_alerts();
        }
        self.clear()?;
        Ok(Some(Event::TimerReset { at: self.now() }))
    }

    /// Completes the session once its end time has passed. Safe to call from
    /// any trigger; idle or unexpired timers are left alone.
    pub fn check_and_complete_if_expired(&mut self) -> Result<Option<Event>> {
        match &self.session {
            Some(s) if s.is_expired(self.now()) => self.complete(),
            _ => Ok(None),
        }
    }

    pub fn dismiss_completion(&mut self) {
        self.completion_visible = false;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn remaining_secs(&self) -> i64 {
        self.session
            .as_ref()
            .map(|s| s.remaining(self.now()).num_seconds())
            .unwrap_or(0)
    }

    fn find_session_task(&self, session: &Session) -> Result<Option<Task>> {
        if !session.task_id.is_empty() {
            if let Some(task) = self.tasks.get_task(&session.task_id)? {
                return Ok(Some(task));
            }
        }
        if session.task_name.is_empty() {
            return Ok(None);
        }
        Ok(self
            .tasks
            .list_tasks()?
            .into_iter()
            .find(|t| t.name == session.task_name))
    }

    /// Ends `session` and credits its task. The persisted session is cleared
    /// first so a session is never credited twice. When the credit fails the
    /// session is persisted again and stays active.
    fn settle(&mut self, session: &Session, elapsed: u32, done_for_today: bool) -> Result<Option<Task>> {
        self.sessions.clear_session()?;
        match self.record_elapsed(session, elapsed, done_for_today) {
            Ok(task) => {
                self.session = None;
                Ok(task)
            }
            Err(e) => {
                if let Err(resave) = self.sessions.save_session(session) {
                    error!(task_id = %session.task_id, error = %resave, "could not persist the session again");
                }
                Err(e)
            }
        }
    }

    fn record_elapsed(&self, session: &Session, elapsed: u32, done_for_today: bool) -> Result<Option<Task>> {
        let Some(mut task) = self.tasks.get_task(&session.task_id)? else {
            warn!(task_id = %session.task_id, "timed task no longer exists; elapsed time dropped");
            return Ok(None);
        };
        task.completed_time = task.completed_time.saturating_add(elapsed);
        if done_for_today {
            task.is_done_for_today = true;
        }
        if let Err(e) = self.tasks.save_tasks(std::slice::from_ref(&task)) {
            error!(task_id = %task.id, error = %e, "failed to save timed task");
            return Err(e.into());
        }
        Ok(Some(task))
    }

    fn cancel_alerts(&self) {
        if let Err(e) = self.notifier.cancel_all() {
            warn!(error = %e, "could not cancel pending alerts");
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.session = None;
        self.sessions.clear_session()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotifierCall, RecordingNotifier};
    use crate::storage::MemoryStore;
    use crate::time::FixedClock;
    use chrono::{FixedOffset, NaiveDate};

    fn t0() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00+02:00").unwrap()
    }

    fn task(name: &str, order: usize, current: u32, completed: u32) -> Task {
        Task::new(name, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
            .with_order(order)
            .with_minutes(current, completed)
    }

    struct Rig {
        store: MemoryStore,
        notifier: RecordingNotifier,
        clock: FixedClock,
    }

    impl Rig {
        fn new(tasks: Vec<Task>) -> Self {
            Self {
                store: MemoryStore::with_tasks(tasks),
                notifier: RecordingNotifier::new(),
                clock: FixedClock::new(t0()),
            }
        }

        fn timer(&self) -> TaskTimer<&MemoryStore, &MemoryStore, &RecordingNotifier, &FixedClock> {
            TaskTimer::new(&self.store, &self.store, &self.notifier, &self.clock)
        }

        fn task(&self, name: &str) -> Task {
            self.store
                .tasks()
                .into_iter()
                .find(|t| t.name == name)
                .unwrap()
        }
    }

    #[test]
    fn start_with_nothing_allocated_stays_idle() {
        let rig = Rig::new(vec![task("a", 0, 0, 0), task("b", 1, 0, 0)]);
        let mut timer = rig.timer();
        assert_eq!(timer.start().unwrap(), None);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(rig.store.load_session().unwrap(), None);
        assert!(rig.notifier.calls().is_empty());
    }

    #[test]
    fn start_refuses_task_already_over_budget() {
        let rig = Rig::new(vec![task("a", 0, 30, 30)]);
        let mut timer = rig.timer();
        assert_eq!(timer.start().unwrap(), None);
        assert!(!timer.is_running());
    }

    #[test]
    fn start_runs_for_remaining_minutes_and_schedules_alert() {
        let rig = Rig::new(vec![task("a", 0, 60, 20)]);
        let mut timer = rig.timer();
        let event = timer.start().unwrap().unwrap();
        assert!(matches!(event, Event::TimerStarted { planned_minutes: 40, .. }));

        let session = timer.session().unwrap().clone();
        assert_eq!(session.end_time - session.start_time, Duration::minutes(40));
        assert_eq!(rig.store.load_session().unwrap(), Some(session.clone()));
        assert_eq!(rig.notifier.pending(), vec![("a".to_string(), session.end_time)]);
        assert_eq!(rig.notifier.calls()[0], NotifierCall::CancelAll);
    }

    #[test]
    fn start_while_running_is_ignored() {
        let rig = Rig::new(vec![task("a", 0, 60, 0), task("b", 1, 60, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        assert_eq!(timer.start().unwrap(), None);
        assert_eq!(timer.session().unwrap().task_name, "a");
    }

    #[test]
    fn stop_after_ten_minutes_adds_ten() {
        let rig = Rig::new(vec![task("a", 0, 30, 15)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(10) + Duration::seconds(59));

        let event = timer.stop().unwrap().unwrap();
        assert!(matches!(
            event,
            Event::TimerStopped { elapsed_minutes: 10, completed_time: 25, budget_met: false, .. }
        ));
        assert_eq!(rig.task("a").completed_time, 25);
        assert!(!timer.completion_visible());
        assert!(!timer.is_running());
        assert_eq!(rig.store.load_session().unwrap(), None);
        assert!(rig.notifier.pending().is_empty());
    }

    #[test]
    fn stop_meeting_budget_shows_completion() {
        let rig = Rig::new(vec![task("a", 0, 10, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(10));
        timer.stop().unwrap();
        assert!(timer.completion_visible());
        assert!(!rig.task("a").is_done_for_today);
        timer.dismiss_completion();
        assert!(!timer.completion_visible());
    }

    #[test]
    fn stop_and_complete_when_idle_are_noops() {
        let rig = Rig::new(vec![task("a", 0, 10, 0)]);
        let mut timer = rig.timer();
        assert_eq!(timer.stop().unwrap(), None);
        assert_eq!(timer.complete().unwrap(), None);
        assert_eq!(rig.task("a").completed_time, 0);
    }

    #[test]
    fn complete_marks_done_for_today_early() {
        let rig = Rig::new(vec![task("a", 0, 60, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(5));
        let event = timer.complete().unwrap().unwrap();
        assert!(matches!(event, Event::TimerCompleted { elapsed_minutes: 5, completed_time: 5, .. }));
        let a = rig.task("a");
        assert!(a.is_done_for_today);
        assert_eq!(a.completed_time, 5);
        assert!(timer.completion_visible());
    }

    #[test]
    fn expiry_check_completes_exactly_once() {
        let rig = Rig::new(vec![task("a", 0, 20, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(19));
        assert_eq!(timer.check_and_complete_if_expired().unwrap(), None);
        rig.clock.advance(Duration::minutes(1));
        assert!(matches!(
            timer.check_and_complete_if_expired().unwrap(),
            Some(Event::TimerCompleted { .. })
        ));
        assert_eq!(timer.check_and_complete_if_expired().unwrap(), None);
        assert_eq!(rig.task("a").completed_time, 20);
    }

    #[test]
    fn restore_rebuilds_unexpired_session() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        {
            let mut first = rig.timer();
            first.start().unwrap();
        }
        rig.clock.advance(Duration::minutes(12));
        let mut second = rig.timer();
        let event = second.restore().unwrap().unwrap();
        assert!(matches!(event, Event::TimerRestored { remaining_secs: 1080, .. }));
        assert!(second.is_running());
        assert_eq!(second.remaining(), (0, 18, 0));
        assert_eq!(second.elapsed_minutes(), 12);
    }

    #[test]
    fn restore_completes_expired_session() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        rig.timer().start().unwrap();
        rig.clock.advance(Duration::hours(2));
        let mut timer = rig.timer();
        assert!(matches!(timer.restore().unwrap(), Some(Event::TimerCompleted { .. })));
        assert!(!timer.is_running());
        assert!(rig.task("a").is_done_for_today);
        assert_eq!(rig.store.load_session().unwrap(), None);
    }

    #[test]
    fn restore_falls_back_to_name_lookup() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        let start = t0().with_timezone(&Utc);
        rig.store
            .save_session(&Session::new("", "a", start, 30))
            .unwrap();
        let mut timer = rig.timer();
        timer.restore().unwrap();
        assert_eq!(timer.session().unwrap().task_id, rig.task("a").id);
    }

    #[test]
    fn restore_discards_session_for_missing_task() {
        let rig = Rig::new(vec![]);
        let start = t0().with_timezone(&Utc);
        rig.store
            .save_session(&Session::new("gone", "gone", start, 30))
            .unwrap();
        let mut timer = rig.timer();
        assert_eq!(timer.restore().unwrap(), None);
        assert_eq!(rig.store.load_session().unwrap(), None);
    }

    #[test]
    fn reset_clears_without_recording_time() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(10));
        assert!(matches!(timer.reset().unwrap(), Some(Event::TimerReset { .. })));
        assert_eq!(rig.task("a").completed_time, 0);
        assert_eq!(rig.store.load_session().unwrap(), None);
        assert_eq!(timer.remaining(), (0, 0, 0));
    }

    #[test]
    fn notifier_failure_does_not_abort_start() {
        let store = MemoryStore::with_tasks(vec![task("a", 0, 30, 0)]);
        let notifier = RecordingNotifier::rejecting();
        let clock = FixedClock::new(t0());
        let mut timer = TaskTimer::new(&store, &store, &notifier, &clock);
        assert!(timer.start().unwrap().is_some());
        assert!(timer.is_running());
    }

    #[test]
    fn failed_save_keeps_session_running() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(5));
        rig.store.fail_saves(true);
        assert!(timer.stop().is_err());
        assert!(timer.is_running());
        assert_eq!(rig.store.load_session().unwrap().as_ref(), timer.session());
        rig.store.fail_saves(false);
        timer.stop().unwrap();
        assert_eq!(rig.task("a").completed_time, 5);
    }

    #[test]
    fn failed_session_clear_credits_nothing_and_restore_credits_once() {
        let rig = Rig::new(vec![task("a", 0, 30, 0)]);
        let mut timer = rig.timer();
        timer.start().unwrap();
        rig.clock.advance(Duration::minutes(5));

        rig.store.fail_session_writes(true);
        assert!(timer.stop().is_err());
        assert!(timer.complete().is_err());
        assert_eq!(rig.task("a").completed_time, 0);
        assert!(timer.is_running());
        rig.store.fail_session_writes(false);
        drop(timer);

        let mut restored = rig.timer();
        restored.restore().unwrap();
        restored.stop().unwrap();
        assert_eq!(rig.task("a").completed_time, 5);

        let mut again = rig.timer();
        assert_eq!(again.restore().unwrap(), None);
        assert_eq!(again.stop().unwrap(), None);
        assert_eq!(rig.task("a").completed_time, 5);
    }

    #[test]
    fn highest_allocation_mode_picks_biggest_budget() {
        let rig = Rig::new(vec![task("small", 0, 10, 0), task("big", 1, 90, 0)]);
        let mut timer = rig.timer().with_mode(SelectionMode::HighestAllocation);
        timer.start().unwrap();
        assert_eq!(timer.session().unwrap().task_name, "big");
        assert_eq!(timer.snapshot().mode, SelectionMode::HighestAllocation);
    }
}
