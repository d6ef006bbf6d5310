//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Day layout (where the day starts, which UTC offset blocks follow)
//! - Auto-continue countdowns
//! - Check-in threshold and grace period
//! - Snapshot cadence
//! - Notification preferences
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::block::BlockClock;
use crate::error::{ConfigError, Result};
use crate::timer::{AutoContinueSettings, CheckInSettings};

/// Day layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayConfig {
    /// Hour whose first block is displayed as block 1.
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u8,
    /// Fixed offset from UTC; the host offset is used when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Auto-continue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoContinueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_continue_secs")]
    pub continue_secs: u32,
    #[serde(default = "default_break_over_secs")]
    pub break_over_secs: u32,
}

/// Check-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u32,
}

/// Crash recovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Ring the terminal bell on alerts.
    #[serde(default)]
    pub bell: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub day: DayConfig,
    #[serde(default)]
    pub auto_continue: AutoContinueConfig,
    #[serde(default)]
    pub check_in: CheckInConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_true() -> bool {
    true
}
fn default_user_id() -> String {
    "local".to_string()
}
fn default_day_start_hour() -> u8 {
    6
}
fn default_continue_secs() -> u32 {
    25
}
fn default_break_over_secs() -> u32 {
    30
}
fn default_threshold() -> u32 {
    3
}
fn default_grace_secs() -> u32 {
    30
}
fn default_snapshot_interval() -> u32 {
    15
}

impl Default for DayConfig {
    fn default() -> Self {
        Self {
            day_start_hour: default_day_start_hour(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for AutoContinueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            continue_secs: default_continue_secs(),
            break_over_secs: default_break_over_secs(),
        }
    }
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bell: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            day: DayConfig::default(),
            auto_continue: AutoContinueConfig::default(),
            check_in: CheckInConfig::default(),
            recovery: RecoveryConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    // Optional numbers are stored as null until set.
                    serde_json::Value::Number(_) | serde_json::Value::Null => {
                        if existing.is_null() && matches!(value, "" | "none" | "null") {
                            serde_json::Value::Null
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
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

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or is out of range.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Flattened `key = value` pairs, sorted by key.
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
        out.sort();
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.day.day_start_hour > 23 {
            return Err(ConfigError::InvalidValue {
                key: "day.day_start_hour".to_string(),
                message: format!("{} is not an hour (0-23)", self.day.day_start_hour),
            });
        }
        if let Some(minutes) = self.day.utc_offset_minutes {
            if !(-14 * 60..=14 * 60).contains(&minutes) {
                return Err(ConfigError::InvalidValue {
                    key: "day.utc_offset_minutes".to_string(),
                    message: format!("{minutes} is outside -840..=840"),
                });
            }
        }
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "user_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn block_clock(&self) -> BlockClock {
        BlockClock::from_config(self.day.utc_offset_minutes)
    }

    pub fn auto_continue_settings(&self) -> AutoContinueSettings {
        AutoContinueSettings {
            enabled: self.auto_continue.enabled,
            continue_secs: self.auto_continue.continue_secs,
            break_over_secs: self.auto_continue.break_over_secs,
        }
    }

    pub fn check_in_settings(&self) -> CheckInSettings {
        CheckInSettings {
            threshold: self.check_in.threshold,
            grace_secs: self.check_in.grace_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.user_id, "local");
        assert_eq!(parsed.day.day_start_hour, 6);
        assert_eq!(parsed.auto_continue.continue_secs, 25);
        assert!(parsed.day.utc_offset_minutes.is_none());
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("user_id = \"ana\"\n[check_in]\nthreshold = 5\n").unwrap();
        assert_eq!(parsed.user_id, "ana");
        assert_eq!(parsed.check_in.threshold, 5);
        assert_eq!(parsed.check_in.grace_secs, 30);
        assert_eq!(parsed.recovery.snapshot_interval_secs, 15);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("auto_continue.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("check_in.grace_secs").as_deref(), Some("30"));
        assert_eq!(cfg.get("user_id").as_deref(), Some("local"));
        assert!(cfg.get("day.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("auto_continue.enabled", "false").unwrap();
        cfg.apply("check_in.threshold", "4").unwrap();
        cfg.apply("day.utc_offset_minutes", "-300").unwrap();
        assert!(!cfg.auto_continue.enabled);
        assert_eq!(cfg.check_in.threshold, 4);
        assert_eq!(cfg.day.utc_offset_minutes, Some(-300));
        assert_eq!(cfg.block_clock().offset_seconds(), -18_000);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.apply("day.nonexistent_key", "1").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let mut cfg = Config::default();
        assert!(cfg.apply("auto_continue.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("day.day_start_hour", "24").is_err());
        assert!(cfg.apply("check_in.grace_secs", "-1").is_err());
        assert_eq!(cfg.day.day_start_hour, 6);
    }

    #[test]
    fn entries_are_flat_and_sorted() {
        let cfg = Config::default();
        let entries = cfg.entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"recovery.snapshot_interval_secs"));
        assert!(keys.contains(&"notifications.bell"));
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn load_from_writes_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.user_id, "local");
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.apply("notifications.bell", "true").unwrap();
        changed.save_to(&path).unwrap();
        assert!(Config::load_from(&path).unwrap().notifications.bell);
    }
}
