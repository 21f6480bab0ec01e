//! Persistent configuration for autopilot runs.
//!
//! Settings live in `~/.autopilot/config.json`. Every field is optional in the
//! file; missing fields take their defaults, and command-line flags override
//! whatever was loaded.
//!
//! # Example
//!
//! ```no_run
//! use autopilot_core::config::AutopilotConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = AutopilotConfig::load();
//! println!("running as {}", config.device);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.json";

/// Returns `~/.autopilot`, creating it if needed.
pub fn autopilot_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".autopilot");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run settings shared by the engine and the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Id of this device in cross-device runs.
    pub device: String,

    /// Store namespace shared by all devices of one run. A fresh id is
    /// generated per run when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Timeout in seconds for wait-style actions that don't give one.
    pub default_timeout: f32,

    /// End the session when any wait times out.
    pub fatal_on_timeout: bool,

    /// End the session on the first failed assertion.
    pub stop_on_failed_step: bool,

    /// Whether hover moves can be injected with no touch down.
    pub hover_supported: bool,

    /// Seconds a click holds the touch down.
    pub click_hold: f32,

    /// Duration of one scroll drag.
    pub scroll_step_time: f32,

    /// Seconds between polls of the shared store.
    pub poll_interval: f32,

    /// Timeout for cross-device waits.
    pub rendezvous_timeout: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Directory for JSON Lines session reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            device: "master".to_string(),
            run_id: None,
            default_timeout: 10.0,
            fatal_on_timeout: false,
            stop_on_failed_step: false,
            hover_supported: true,
            click_hold: 0.05,
            scroll_step_time: 0.2,
            poll_interval: 0.1,
            rendezvous_timeout: 300.0,
            store_path: None,
            report_dir: None,
        }
    }
}

impl AutopilotConfig {
    /// Load config from `~/.autopilot/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&autopilot_dir().join(CONFIG_FILENAME)).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save config to `~/.autopilot/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&autopilot_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Configured run id, or a newly generated one.
    pub fn resolve_run_id(&self) -> String {
        self.run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AutopilotConfig::default();
        assert_eq!(config.device, "master");
        assert_eq!(config.default_timeout, 10.0);
        assert_eq!(config.click_hold, 0.05);
        assert_eq!(config.rendezvous_timeout, 300.0);
        assert!(!config.fatal_on_timeout);
        assert!(config.hover_supported);
    }

    #[test]
    fn deserialize_partial_json() {
        let loaded: AutopilotConfig =
            serde_json::from_str(r#"{"device": "helper1", "fatal_on_timeout": true}"#).unwrap();
        assert_eq!(loaded.device, "helper1");
        assert!(loaded.fatal_on_timeout);
        assert_eq!(loaded.poll_interval, 0.1);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AutopilotConfig {
            run_id: Some("nightly".to_string()),
            store_path: Some(PathBuf::from("/tmp/store.redb")),
            ..AutopilotConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AutopilotConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_error_for_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let err = AutopilotConfig::load_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn resolve_run_id_prefers_configured() {
        let mut config = AutopilotConfig::default();
        assert_eq!(config.resolve_run_id().len(), 36);
        config.run_id = Some("r1".to_string());
        assert_eq!(config.resolve_run_id(), "r1");
    }
}
