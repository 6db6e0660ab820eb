//! Builders for test configuration.

#![allow(dead_code)]

use designflow::{Config, SimulationConfig};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new("/tmp/designflow-assets"),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.version = version.to_string();
        self
    }

    pub fn asset_directory(mut self, dir: &str) -> Self {
        self.config.asset_directory = dir.to_string();
        self
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.config.database_path = Some(path.to_string());
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity;
        self
    }

    pub fn simulation(mut self, step_delay_ms: u64, progress_ticks: u32) -> Self {
        self.config.simulation = SimulationConfig {
            step_delay_ms,
            progress_ticks,
        };
        self
    }

    pub fn build(self) -> Config {
        self.config
    }

    pub fn to_json(self) -> String {
        serde_json::to_string_pretty(&self.config).expect("Failed to serialize config")
    }
}
