//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Sleep deadline and budget adjustments for allocation
//! - Wake-up and home times used for day splits
//! - Timer task selection mode
//! - Alert follow-up settings
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::alerts::{MAX_FOLLOW_UPS, MAX_FOLLOW_UP_INTERVAL_MINUTES};
use super::data_dir;
use crate::allocation::{check_school_multiplier, AllocationSettings};
use crate::error::ConfigError;
use crate::time::{Rollover, TimeOfDay};
use crate::timer::SelectionMode;

/// Day boundaries and budget adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sleep_time")]
    pub sleep_time: TimeOfDay,
    /// Force the sleep deadline onto tomorrow.
    #[serde(default)]
    pub sleep_tomorrow: bool,
    /// Start the budget window 24 hours from now.
    #[serde(default)]
    pub is_tomorrow: bool,
    #[serde(default)]
    pub rollover: Rollover,
    /// Minutes subtracted from the budget.
    #[serde(default)]
    pub offset_minutes: i64,
    /// Minutes subtracted from the budget on top of the offset.
    #[serde(default)]
    pub extra_minutes: i64,
    #[serde(default = "default_home_time")]
    pub home_time: TimeOfDay,
    #[serde(default = "default_wake_up_time")]
    pub wake_up_time: TimeOfDay,
    #[serde(default = "default_wake_up_time")]
    pub today_wake_up_time: TimeOfDay,
    /// Show the evening half-time marker.
    #[serde(default = "default_true")]
    pub half_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Urgency weight applied to non-school tasks.
    #[serde(default = "default_school_multiplier")]
    pub school_multiplier: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default)]
    pub selection_mode: SelectionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Alerts repeated after the completion alert.
    #[serde(default = "default_follow_up_count")]
    pub follow_up_count: u32,
    #[serde(default = "default_follow_up_interval")]
    pub follow_up_interval_minutes: u32,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_sleep_time() -> TimeOfDay {
    TimeOfDay::from_minutes(23 * 60)
}
fn default_home_time() -> TimeOfDay {
    TimeOfDay::from_minutes(17 * 60)
}
fn default_wake_up_time() -> TimeOfDay {
    TimeOfDay::from_minutes(7 * 60)
}
fn default_true() -> bool {
    true
}
fn default_school_multiplier() -> f64 {
    0.1
}
fn default_follow_up_count() -> u32 {
    3
}
fn default_follow_up_interval() -> u32 {
    1
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sleep_time: default_sleep_time(),
            sleep_tomorrow: false,
            is_tomorrow: false,
            rollover: Rollover::Auto,
            offset_minutes: 0,
            extra_minutes: 0,
            home_time: default_home_time(),
            wake_up_time: default_wake_up_time(),
            today_wake_up_time: default_wake_up_time(),
            half_time: true,
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            school_multiplier: default_school_multiplier(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            follow_up_count: default_follow_up_count(),
            follow_up_interval_minutes: default_follow_up_interval(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("expected true or false, got '{value}'")))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) => return Err(unknown()),
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults when the file is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or holds an
    /// out-of-range value, or if the default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(format!("{}: {e}", path.display())))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The caller decides where to save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_school_multiplier(self.allocation.school_multiplier).map_err(|e| {
            ConfigError::InvalidValue {
                key: "allocation.school_multiplier".into(),
                message: e.to_string(),
            }
        })?;
        let n = &self.notifications;
        if n.follow_up_count > MAX_FOLLOW_UPS {
            return Err(ConfigError::InvalidValue {
                key: "notifications.follow_up_count".into(),
                message: format!("at most {MAX_FOLLOW_UPS}, got {}", n.follow_up_count),
            });
        }
        if !(1..=MAX_FOLLOW_UP_INTERVAL_MINUTES).contains(&n.follow_up_interval_minutes) {
            return Err(ConfigError::InvalidValue {
                key: "notifications.follow_up_interval_minutes".into(),
                message: format!(
                    "expected 1..={MAX_FOLLOW_UP_INTERVAL_MINUTES}, got {}",
                    n.follow_up_interval_minutes
                ),
            });
        }
        Ok(())
    }

    /// Every leaf key with its value, in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    pub fn allocation_settings(&self) -> AllocationSettings {
        AllocationSettings {
            offset_minutes: self.schedule.offset_minutes,
            extra_minutes: self.schedule.extra_minutes,
            school_multiplier: self.allocation.school_multiplier,
        }
    }
}
