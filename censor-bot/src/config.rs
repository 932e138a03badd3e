//! # Configuration
//!
//! Loads, validates, and applies environment overrides to the bot's YAML
//! configuration file.
//!
//! ## Configuration Structure
//!
//! - **bot**: administrator id and ban threshold.
//! - **telegram**: bot token.
//! - **censor**: plugin manager strategy, timeout, and per-plugin settings.
//! - **storage**: the `memory://<name>?ttl=<duration>` violation-counter URL.
//! - **http**: bind address for the metrics/health server.
//! - **logging**: tracing filter level.
//!
//! ## Environment Variables
//!
//! - `CENSOR_STRATEGY`, `CENSOR_TIMEOUT`, `CENSOR_ENABLED_ONLY`
//! - `TELEGRAM_TOKEN`
//! - `CENSOR_LOG_LEVEL`
//!
//! ## Example
//!
//! ```yaml
//! bot:
//!   admin_id: 12345
//!   ban_threshold: 3
//! telegram:
//!   token: "123456:ABC-DEF"
//! censor:
//!   strategy: sequential
//!   timeout: 5s
//!   enabled_only: true
//!   error_action: block
//!   skip_action: allow
//!   plugins:
//!     keyword:
//!       enabled: true
//!       config:
//!         blacklist: ["spam"]
//! storage:
//!   url: "memory://violations?ttl=24h"
//! http:
//!   address: "0.0.0.0:9090"
//! logging:
//!   level: info
//! ```

use std::collections::HashMap;
use std::env;

use censor_core::manager::{ManagerConfig, Strategy};
use censor_core::plugin::PluginConfigEntry as CorePluginConfigEntry;
use censor_core::{Action, Error as CoreError};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub telegram: TelegramConfig,
    pub censor: CensorConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub admin_id: i64,
    #[serde(default = "default_ban_threshold")]
    pub ban_threshold: u8,
}

fn default_ban_threshold() -> u8 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensorConfig {
    pub strategy: String,
    #[serde(with = "censor_core::duration::serde_duration")]
    pub timeout: std::time::Duration,
    pub enabled_only: bool,
    pub error_action: String,
    pub skip_action: String,
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfigEntry>,
}

/// Wire shape for one plugin's config block; converted into
/// `censor_core::PluginConfigEntry` once the manager is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfigEntry {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl From<PluginConfigEntry> for CorePluginConfigEntry {
    fn from(entry: PluginConfigEntry) -> Self {
        CorePluginConfigEntry {
            enabled: entry.enabled,
            priority_override: entry.priority,
            opts: entry.config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    #[serde(default)]
    pub proxy_header: Option<String>,
    #[serde(default)]
    pub proxies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse {path}: {e}")))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(strategy) = env::var("CENSOR_STRATEGY") {
            self.censor.strategy = strategy;
        }
        if let Ok(timeout) = env::var("CENSOR_TIMEOUT") {
            if let Ok(parsed) = censor_core::parse_duration(&timeout) {
                self.censor.timeout = parsed;
            }
        }
        if let Ok(enabled_only) = env::var("CENSOR_ENABLED_ONLY") {
            if let Ok(parsed) = enabled_only.parse::<bool>() {
                self.censor.enabled_only = parsed;
            }
        }
        if let Ok(level) = env::var("CENSOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(token) = env::var("TELEGRAM_TOKEN") {
            self.telegram.token = token;
        }
    }

    /// Validates cross-field invariants the engine itself can't check at
    /// construction time (it only ever sees the already-resolved
    /// `ManagerConfig`).
    pub fn validate(&self) -> Result<(), Error> {
        if self.telegram.token.is_empty() {
            return Err(Error::Config("telegram.token must not be empty".into()));
        }
        if self.bot.ban_threshold == 0 {
            return Err(Error::Config("bot.ban_threshold must be > 0".into()));
        }
        if !self.storage.url.starts_with("memory://") {
            return Err(Error::Config(format!(
                "storage.url must use the memory:// scheme, got: {}",
                self.storage.url
            )));
        }
        parse_action(&self.censor.error_action)
            .map_err(|e| Error::Config(format!("censor.error_action: {e}")))?;
        parse_action(&self.censor.skip_action)
            .map_err(|e| Error::Config(format!("censor.skip_action: {e}")))?;
        Strategy::parse(&self.censor.strategy).map_err(|e| Error::Config(e.to_string()))?;
        if self.censor.timeout.is_zero() {
            return Err(Error::Config("censor.timeout must be > 0".into()));
        }
        for (name, entry) in &self.censor.plugins {
            if let Some(priority) = entry.priority {
                if priority < 0 {
                    return Err(Error::Config(format!(
                        "censor.plugins.{name}.priority must be >= 0, got {priority}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the manager configuration the engine expects, once the file
    /// has already passed `validate()`.
    pub fn manager_config(&self) -> Result<ManagerConfig, Error> {
        Ok(ManagerConfig {
            strategy: Strategy::parse(&self.censor.strategy).map_err(|e| Error::Config(e.to_string()))?,
            timeout: self.censor.timeout,
            enabled_only: self.censor.enabled_only,
            error_action: parse_action(&self.censor.error_action).map_err(|e| Error::Config(e.to_string()))?,
            skip_action: parse_action(&self.censor.skip_action).map_err(|e| Error::Config(e.to_string()))?,
        })
    }
}

fn parse_action(s: &str) -> Result<Action, CoreError> {
    match s {
        "allow" => Ok(Action::Allow),
        "block" => Ok(Action::Block),
        other => Err(CoreError::InvalidConfig(format!(
            "action must be \"allow\" or \"block\", got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"
bot:
  admin_id: 1
telegram:
  token: "test-token"
censor:
  strategy: sequential
  timeout: 5s
  enabled_only: true
  error_action: block
  skip_action: allow
  plugins:
    keyword:
      enabled: true
      config:
        blacklist: ["spam"]
storage:
  url: "memory://violations?ttl=24h"
http:
  address: "0.0.0.0:9090"
"#
    }

    #[test]
    fn parses_minimal_config() {
        let config: Config = serde_yaml::from_str(sample()).unwrap();
        assert_eq!(config.bot.ban_threshold, 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.censor.timeout, std::time::Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_memory_storage_url() {
        let mut config: Config = serde_yaml::from_str(sample()).unwrap();
        config.storage.url = "redis://localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_skip_action_of_skip() {
        let mut config: Config = serde_yaml::from_str(sample()).unwrap();
        config.censor.skip_action = "skip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_plugin_priority_override() {
        let mut config: Config = serde_yaml::from_str(sample()).unwrap();
        config.censor.plugins.get_mut("keyword").unwrap().priority = Some(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_replaces_strategy() {
        let mut config: Config = serde_yaml::from_str(sample()).unwrap();
        std::env::set_var("CENSOR_STRATEGY", "parallel");
        config.apply_env_overrides();
        std::env::remove_var("CENSOR_STRATEGY");
        assert_eq!(config.censor.strategy, "parallel");
    }
}
