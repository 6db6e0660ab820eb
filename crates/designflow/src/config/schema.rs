use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; `~/` is expanded. Falls back to
    /// `~/.designflow/data/designflow.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Root directory for uploaded images.
    pub asset_directory: String,
    /// Unread changes a subscriber may fall behind before it lags.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_notification_capacity() -> usize {
    64
}

impl Config {
    pub fn new(asset_directory: impl Into<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            asset_directory: asset_directory.into(),
            notification_capacity: default_notification_capacity(),
            simulation: SimulationConfig::default(),
        }
    }

    /// Database location with `~/` expanded.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) => Some(expand_home(path)),
            None => default_database_path(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Timing of the simulated stage executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Progress reports per stage, evenly spaced over the delay.
    #[serde(default = "default_progress_ticks")]
    pub progress_ticks: u32,
}

fn default_step_delay_ms() -> u64 {
    500
}

fn default_progress_ticks() -> u32 {
    4
}

impl SimulationConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            progress_ticks: default_progress_ticks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_database_path_expands_home() {
        let mut config = Config::new("/assets");
        config.database_path = Some("~/designs/db.sqlite".to_string());

        let path = config.resolved_database_path().unwrap();
        assert!(path.ends_with("designs/db.sqlite"));
        assert!(!path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_absolute_database_path_is_kept() {
        let mut config = Config::new("/assets");
        config.database_path = Some("/var/lib/designflow.db".to_string());
        assert_eq!(
            config.resolved_database_path(),
            Some(PathBuf::from("/var/lib/designflow.db"))
        );
    }

    #[test]
    fn test_step_delay() {
        let simulation = SimulationConfig {
            step_delay_ms: 250,
            progress_ticks: 5,
        };
        assert_eq!(simulation.step_delay(), Duration::from_millis(250));
    }
}
