//! Planner configuration: pipeline defaults and provider timeout/retry budget.
//!
//! ## Example: TOML configuration
//!
//! ```toml
//! [pipeline]
//! samples_per_path = 20
//! collision_radius = 0.5
//!
//! [provider]
//! timeout_secs = 30
//! retries = 3
//! ```
//!
//! See also: `src/pipeline.rs` for how these values feed the coordinator.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_samples_per_path")]
    pub samples_per_path: usize,
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f64,
    #[serde(default = "default_resolver_attempt_budget")]
    pub resolver_attempt_budget: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            samples_per_path: default_samples_per_path(),
            collision_radius: default_collision_radius(),
            resolver_attempt_budget: default_resolver_attempt_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

fn default_samples_per_path() -> usize {
    20
}
fn default_collision_radius() -> f64 {
    0.5
}
fn default_resolver_attempt_budget() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.samples_per_path < 2 {
            return Err(ConfigError::Validation(
                "pipeline.samples_per_path must be >= 2".to_string(),
            ));
        }
        if self.pipeline.collision_radius < 0.0 {
            return Err(ConfigError::Validation(
                "pipeline.collision_radius must be >= 0".to_string(),
            ));
        }
        if self.provider.retries > 3 {
            return Err(ConfigError::Validation(
                "provider.retries must be <= 3".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
