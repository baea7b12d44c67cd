//! Editor settings persisted between sessions.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV: &str = "WN_SETTINGS";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Last date entered in the run-to field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_to_date: Option<NaiveDate>,
    /// Last model file opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<PathBuf>,
}

impl EditorSettings {
    /// `$WN_SETTINGS`, or a file in the temp directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("waternet-settings.json"))
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Run-to date to show, falling back to `default` when none was saved.
    pub fn run_to_or(&self, default: NaiveDate) -> NaiveDate {
        self.run_to_date.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("wn-settings-missing-does-not-exist.json");
        assert_eq!(EditorSettings::load(&path).unwrap(), EditorSettings::default());
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("wn-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = EditorSettings {
            run_to_date: NaiveDate::from_ymd_opt(2015, 1, 3),
            last_model: Some(PathBuf::from("models/reservoir.json")),
        };
        settings.save(&path).unwrap();
        assert_eq!(EditorSettings::load(&path).unwrap(), settings);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn run_to_fallback() {
        let default = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
        assert_eq!(EditorSettings::default().run_to_or(default), default);
    }
}
