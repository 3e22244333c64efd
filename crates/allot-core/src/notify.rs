//! Completion alerts for the active-task timer.

use chrono::{DateTime, Utc};

use crate::error::NotifyError;

/// Schedules and cancels "task time is up" alerts.
///
/// Scheduling never implicitly cancels; the timer calls `cancel_all` first.
pub trait Notifier {
    fn schedule_completion_alert(
        &self,
        task_name: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;

    fn cancel_all(&self) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn schedule_completion_alert(
        &self,
        task_name: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        (**self).schedule_completion_alert(task_name, fire_at)
    }

    fn cancel_all(&self) -> Result<(), NotifyError> {
        (**self).cancel_all()
    }
}

/// Drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn schedule_completion_alert(&self, _: &str, _: DateTime<Utc>) -> Result<(), NotifyError> {
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use recording::{NotifierCall, RecordingNotifier};
