//! Configuration for the `chime` binary.

use std::{path::PathBuf, time::Duration};

use chime_engine::EngineConfig;
use chime_gateway::GatewayConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Prefix for environment overrides, e.g. `CHIME__GATEWAY__PASSWORD`.
pub const ENV_PREFIX: &str = "CHIME";

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("chime.sqlite3") }
fn default_verification_command() -> String { "reg".into() }
fn default_secs() -> u64 { 15 }

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `CHIME__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  #[serde(default = "default_verification_command")]
  pub verification_command: String,
  #[serde(default)]
  pub scheduler:            SchedulerConfig,
  pub gateway:              GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
  #[serde(default = "default_secs")]
  pub poll_interval_secs: u64,
  #[serde(default = "default_secs")]
  pub grace_lag_secs:     u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self { poll_interval_secs: default_secs(), grace_lag_secs: default_secs() }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists) and apply environment overrides.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    Self::from_source(File::from(path.into()).required(false))
  }

  fn from_source<T>(file: T) -> Result<Self, ConfigError>
  where
    T: config::Source + Send + Sync + 'static,
  {
    Config::builder()
      .add_source(file)
      .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
      .build()?
      .try_deserialize()
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      poll_interval:        Duration::from_secs(self.scheduler.poll_interval_secs),
      grace_lag:            Duration::from_secs(self.scheduler.grace_lag_secs),
      verification_command: self.verification_command.clone(),
    }
  }
}
