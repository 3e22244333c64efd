mod engine;
mod session;

pub use engine::{TaskTimer, TimerSnapshot, TimerState};
pub use session::{SelectionMode, Session};
