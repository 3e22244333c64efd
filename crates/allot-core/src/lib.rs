//! # Allot Core Library
//!
//! Business logic for allot, a task list that splits the rest of the day
//! between open tasks and times the one you are working on.
//!
//! ## Architecture
//!
//! - **Allocation**: distributes the minutes left before the sleep deadline
//!   across eligible tasks, weighted by deadline proximity and category
//! - **Timer**: a wall-clock session over a single task that survives process
//!   restarts; callers drive expiry with `check_and_complete_if_expired()`
//! - **Storage**: SQLite task/session persistence, TOML configuration and a
//!   JSONL alert queue
//! - **Time**: clock abstraction, time-of-day rollover and day splits
//!
//! ## Key Components
//!
//! - [`AllocationEngine`]: computes and applies per-task daily budgets
//! - [`TaskTimer`]: active-task timer state machine
//! - [`Database`]: task and session persistence
//! - [`Config`]: application configuration management

pub mod allocation;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod task;
pub mod time;
pub mod timer;

pub use allocation::{AllocationEngine, AllocationPlan, AllocationSettings, TaskAllocation};
pub use error::{ConfigError, CoreError, NotifyError, StoreError, ValidationError};
pub use events::Event;
pub use notify::{Notifier, NoopNotifier};
pub use storage::{AlertQueue, Config, Database, MemoryStore, SessionStore, TaskStore};
pub use task::Task;
pub use time::{BudgetWindow, Clock, FixedClock, Rollover, SystemClock, TimeOfDay};
pub use timer::{SelectionMode, Session, TaskTimer, TimerSnapshot, TimerState};
