use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const MIN_CHECK_INTERVAL_SECONDS: u32 = 1;
pub const MAX_CHECK_INTERVAL_SECONDS: u32 = 60;

/// User settings, persisted as a flat json object in the application
/// directory. The daemon reads them once at startup; changing the interval or
/// the idle threshold requires a daemon restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Foreground poll cadence, also the minimum dwell time an activity needs
    /// before a close is persisted.
    pub check_interval_seconds: u32,
    /// Zero disables idle detection entirely.
    pub idle_threshold_minutes: u32,
    /// Case-insensitive substrings marking an app as productive in reports.
    pub productivity_apps: Vec<String>,
    pub is_dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval_seconds: 3,
            idle_threshold_minutes: 5,
            productivity_apps: vec![
                "VS Code".into(),
                "Google Chrome".into(),
                "PyCharm".into(),
            ],
            is_dark_mode: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "check interval must be between {MIN_CHECK_INTERVAL_SECONDS} and \
         {MAX_CHECK_INTERVAL_SECONDS} seconds, got {0}"
    )]
    CheckIntervalOutOfRange(u32),
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CHECK_INTERVAL_SECONDS..=MAX_CHECK_INTERVAL_SECONDS)
            .contains(&self.check_interval_seconds)
        {
            return Err(ConfigError::CheckIntervalOutOfRange(
                self.check_interval_seconds,
            ));
        }
        Ok(())
    }

    pub fn idle_threshold_seconds(&self) -> u64 {
        u64::from(self.idle_threshold_minutes) * 60
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.check_interval_seconds))
    }

    /// An app is productive when its name contains any configured keyword,
    /// case-insensitively.
    pub fn is_productive(&self, app_name: &str) -> bool {
        let lower = app_name.to_lowercase();
        self.productivity_apps
            .iter()
            .any(|keyword| !keyword.is_empty() && lower.contains(&keyword.to_lowercase()))
    }

    /// Applies a `config set key value` edit.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "check_interval_seconds" => {
                self.check_interval_seconds = value.trim().parse().map_err(|_| invalid())?;
            }
            "idle_threshold_minutes" => {
                self.idle_threshold_minutes = value.trim().parse().map_err(|_| invalid())?;
            }
            "productivity_apps" => {
                self.productivity_apps = value
                    .split(',')
                    .map(|app| app.trim().to_string())
                    .filter(|app| !app.is_empty())
                    .collect();
            }
            "is_dark_mode" => {
                self.is_dark_mode = value.trim().parse().map_err(|_| invalid())?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        self.validate()
    }

    /// Loads settings from `config.json`; a missing or unreadable file means
    /// defaults, never a failure.
    pub fn load(application_data_path: &Path) -> Settings {
        let path = application_data_path.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!("Failed to read {path:?}, using default settings: {e}");
                return Settings::default();
            }
        };
        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    warn!("Stored settings are out of range ({e}), using defaults");
                    Settings::default()
                }
            },
            Err(e) => {
                warn!("Failed to parse {path:?}, using default settings: {e}");
                Settings::default()
            }
        }
    }

    pub fn save(&self, application_data_path: &Path) -> anyhow::Result<()> {
        self.validate()?;
        let path = application_data_path.join(CONFIG_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.idle_threshold_seconds(), 300);
    }

    #[test]
    fn interval_bounds_are_enforced() {
        let mut settings = Settings::default();
        settings.check_interval_seconds = 0;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::CheckIntervalOutOfRange(0))
        );
        settings.check_interval_seconds = 61;
        assert!(settings.validate().is_err());
        settings.check_interval_seconds = 60;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn productive_match_is_case_insensitive_substring() {
        let settings = Settings::default();
        assert!(settings.is_productive("vs code"));
        assert!(settings.is_productive("My PyCharm Project"));
        assert!(!settings.is_productive("Netflix"));
    }

    #[test]
    fn set_key_parses_and_validates() {
        let mut settings = Settings::default();
        settings.set_key("idle_threshold_minutes", "10").unwrap();
        assert_eq!(settings.idle_threshold_minutes, 10);

        settings
            .set_key("productivity_apps", "Slack, Zoom , ")
            .unwrap();
        assert_eq!(settings.productivity_apps, vec!["Slack", "Zoom"]);

        assert!(matches!(
            settings.set_key("check_interval_seconds", "nope"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set_key("theme", "dark"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert_eq!(
            settings.set_key("check_interval_seconds", "0"),
            Err(ConfigError::CheckIntervalOutOfRange(0))
        );
    }

    #[test]
    fn load_recovers_from_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        assert_eq!(Settings::load(dir.path()), Settings::default());

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").unwrap();
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.check_interval_seconds = 7;
        settings.is_dark_mode = true;
        settings.save(dir.path()).unwrap();
        assert_eq!(Settings::load(dir.path()), settings);
    }
}
