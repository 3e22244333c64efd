//! JSONL-backed alert queue.
//!
//! Each scheduled alert is one JSON line in `alerts.jsonl`. A completion alert
//! is followed by `follow_up_count` repeats spaced `follow_up_interval` apart.
//! Cancelling marks every pending record cancelled, so the file doubles as a
//! log of what was scheduled. Records cancelled by an earlier call are dropped
//! once they fall a week behind the newest record.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::NotificationsConfig;
use crate::error::NotifyError;
use crate::notify::Notifier;

/// Upper bound on follow-ups per completion alert.
pub const MAX_FOLLOW_UPS: u32 = 10;
/// Upper bound on the spacing between follow-ups.
pub const MAX_FOLLOW_UP_INTERVAL_MINUTES: u32 = 24 * 60;
const CANCELLED_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Completion,
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub kind: AlertKind,
    pub task_name: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct AlertQueue {
    path: PathBuf,
    enabled: bool,
    follow_up_count: u32,
    follow_up_interval_minutes: i64,
}

impl AlertQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_settings(path, &NotificationsConfig::default())
    }

    /// Out-of-range follow-up settings are clamped to the config bounds.
    pub fn with_settings(path: impl Into<PathBuf>, settings: &NotificationsConfig) -> Self {
        Self {
            path: path.into(),
            enabled: settings.enabled,
            follow_up_count: settings.follow_up_count.min(MAX_FOLLOW_UPS),
            follow_up_interval_minutes: i64::from(
                settings
                    .follow_up_interval_minutes
                    .clamp(1, MAX_FOLLOW_UP_INTERVAL_MINUTES),
            ),
        }
    }

    fn follow_up_time(&self, fire_at: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        let minutes = self.follow_up_interval_minutes.checked_mul(i64::from(n))?;
        fire_at.checked_add_signed(Duration::try_minutes(minutes)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file, oldest first. Unreadable lines are skipped.
    pub fn records(&self) -> Result<Vec<AlertRecord>, NotifyError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AlertRecord>(&line) {
                Ok(rec) => out.push(rec),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping unreadable alert record"),
            }
        }
        Ok(out)
    }

    /// Alerts that have not been cancelled.
    pub fn pending(&self) -> Result<Vec<AlertRecord>, NotifyError> {
        Ok(self.records()?.into_iter().filter(|r| !r.cancelled).collect())
    }

    /// Pending alerts whose fire time is at or before `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<AlertRecord>, NotifyError> {
        Ok(self
            .pending()?
            .into_iter()
            .filter(|r| r.fire_at <= now)
            .collect())
    }

    fn append(&self, records: &[AlertRecord]) -> Result<(), NotifyError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for rec in records {
            writeln!(file, "{}", serde_json::to_string(rec)?)?;
        }
        Ok(())
    }

    fn rewrite(&self, records: &[AlertRecord]) -> Result<(), NotifyError> {
        let mut buf = String::new();
        for rec in records {
            buf.push_str(&serde_json::to_string(rec)?);
            buf.push('\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, buf)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Notifier for AlertQueue {
    fn schedule_completion_alert(
        &self,
        task_name: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        if !self.enabled {
            debug!(task_name, "alerts disabled; not scheduling");
            return Ok(());
        }

        let title = format!("{task_name} is done");
        let body = format!("Time is up for {task_name}.");
        let mut records = vec![AlertRecord {
            id: Uuid::new_v4().to_string(),
            kind: AlertKind::Completion,
            task_name: task_name.to_string(),
            title: title.clone(),
            body: body.clone(),
            fire_at,
            cancelled: false,
        }];
        for n in 1..=self.follow_up_count {
            let Some(at) = self.follow_up_time(fire_at, n) else {
                warn!(task_name, %fire_at, n, "follow-up time out of range; dropping the rest");
                break;
            };
            records.push(AlertRecord {
                id: Uuid::new_v4().to_string(),
                kind: AlertKind::FollowUp,
                task_name: task_name.to_string(),
                title: title.clone(),
                body: body.clone(),
                fire_at: at,
                cancelled: false,
            });
        }
        self.append(&records)?;
        debug!(task_name, %fire_at, count = records.len(), "alerts queued");
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), NotifyError> {
        let records = self.records()?;
        let Some(newest) = records.iter().map(|r| r.fire_at).max() else {
            return Ok(());
        };
        let horizon = Duration::try_days(CANCELLED_RETENTION_DAYS)
            .and_then(|d| newest.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let before = records.len();
        let mut cancelled = 0usize;
        let kept: Vec<AlertRecord> = records
            .into_iter()
            .filter(|r| !(r.cancelled && r.fire_at < horizon))
            .map(|mut r| {
                if !r.cancelled {
                    r.cancelled = true;
                    cancelled += 1;
                }
                r
            })
            .collect();
        let pruned = before - kept.len();
        if cancelled == 0 && pruned == 0 {
            return Ok(());
        }
        debug!(cancelled, pruned, "alerts cancelled");
        self.rewrite(&kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fire_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 40, 0).unwrap()
    }

    #[test]
    fn schedules_completion_and_follow_ups() {
        let dir = TempDir::new().unwrap();
        let queue = AlertQueue::new(dir.path().join("alerts.jsonl"));
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();

        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 4);
        assert_eq!(pending[0].kind, AlertKind::Completion);
        assert_eq!(pending[0].fire_at, fire_at());
        assert_eq!(pending[3].kind, AlertKind::FollowUp);
        assert_eq!(pending[3].fire_at, fire_at() + Duration::minutes(3));
        assert!(pending[0].title.contains("Essay"));
    }

    #[test]
    fn cancel_marks_everything_cancelled() {
        let dir = TempDir::new().unwrap();
        let queue = AlertQueue::new(dir.path().join("alerts.jsonl"));
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        queue.cancel_all().unwrap();
        assert!(queue.pending().unwrap().is_empty());
        assert_eq!(queue.records().unwrap().len(), 4);

        queue.schedule_completion_alert("Math", fire_at()).unwrap();
        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 4);
        assert!(pending.iter().all(|r| r.task_name == "Math"));
    }

    #[test]
    fn cancel_without_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let queue = AlertQueue::new(dir.path().join("alerts.jsonl"));
        queue.cancel_all().unwrap();
        assert!(queue.records().unwrap().is_empty());
    }

    #[test]
    fn disabled_queue_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let settings = NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        };
        let queue = AlertQueue::with_settings(dir.path().join("alerts.jsonl"), &settings);
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        assert!(!queue.path().exists());
    }

    #[test]
    fn due_filters_by_fire_time() {
        let dir = TempDir::new().unwrap();
        let queue = AlertQueue::new(dir.path().join("alerts.jsonl"));
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        assert_eq!(queue.due(fire_at() + Duration::seconds(90)).unwrap().len(), 2);
        assert!(queue.due(fire_at() - Duration::seconds(1)).unwrap().is_empty());
    }

    #[test]
    fn cancel_prunes_stale_cancelled_records() {
        let dir = TempDir::new().unwrap();
        let queue = AlertQueue::new(dir.path().join("alerts.jsonl"));
        queue.schedule_completion_alert("Old", fire_at() - Duration::days(10)).unwrap();
        queue.cancel_all().unwrap();
        assert_eq!(queue.records().unwrap().len(), 4);

        queue.schedule_completion_alert("Recent", fire_at() - Duration::days(1)).unwrap();
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        queue.cancel_all().unwrap();

        let records = queue.records().unwrap();
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.cancelled && r.task_name != "Old"));
    }

    #[test]
    fn follow_ups_are_bounded_and_never_overflow() {
        let dir = TempDir::new().unwrap();
        let settings = NotificationsConfig {
            enabled: true,
            follow_up_count: u32::MAX,
            follow_up_interval_minutes: u32::MAX,
        };
        let queue = AlertQueue::with_settings(dir.path().join("alerts.jsonl"), &settings);
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 1 + MAX_FOLLOW_UPS as usize);
        assert_eq!(
            pending[1].fire_at,
            fire_at() + Duration::minutes(i64::from(MAX_FOLLOW_UP_INTERVAL_MINUTES))
        );

        let late = DateTime::<Utc>::MAX_UTC - Duration::minutes(90);
        let queue = AlertQueue::with_settings(dir.path().join("late.jsonl"), &NotificationsConfig {
            follow_up_interval_minutes: 60,
            ..NotificationsConfig::default()
        });
        assert_eq!(queue.follow_up_time(late, 1), Some(late + Duration::minutes(60)));
        assert_eq!(queue.follow_up_time(late, 2), None);
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.jsonl");
        fs::write(&path, "not json\n\n").unwrap();
        let queue = AlertQueue::new(&path);
        queue.schedule_completion_alert("Essay", fire_at()).unwrap();
        assert_eq!(queue.records().unwrap().len(), 4);
    }
}
