use std::time::Duration;

use checkop_checkly::DEFAULT_BASE_URL;
use checkop_core::ControllerDomain;
use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorConfig {
    #[serde(default)]
    pub controller: ControllerSettings,
    /// Checkly API credentials and timeouts
    #[serde(default)]
    pub checkly: ChecklySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OperatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Controller validations
        if self.controller.domain.as_str().is_empty() {
            return Err("controller.domain must not be empty".into());
        }
        if self.controller.workers == 0 {
            return Err("controller.workers must be > 0".into());
        }
        if self.controller.resync_interval_secs == 0 {
            return Err("controller.resync_interval_secs must be > 0".into());
        }
        if self.controller.retry_base_ms == 0 || self.controller.not_ready_delay_ms == 0 {
            return Err("controller retry delays must be > 0".into());
        }
        if self.controller.retry_base_ms > self.controller.retry_max_ms {
            return Err("controller.retry_base_ms must be <= controller.retry_max_ms".into());
        }
        // Checkly validations
        if self.checkly.base_url.is_empty() {
            return Err("checkly.base_url must not be empty".into());
        }
        if self.checkly.request_timeout_ms == 0 || self.checkly.sync_timeout_ms == 0 {
            return Err("checkly timeouts must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Namespaces finalizer and annotation keys
    #[serde(default)]
    pub domain: ControllerDomain,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    /// Attempts before a failing or not-ready record is left to the next resync
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "default_not_ready_delay_ms")]
    pub not_ready_delay_ms: u64,
}

fn default_workers() -> usize {
    2
}
fn default_resync_interval_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    10
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_max_ms() -> u64 {
    60_000
}
fn default_not_ready_delay_ms() -> u64 {
    5_000
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            domain: ControllerDomain::default(),
            workers: default_workers(),
            resync_interval_secs: default_resync_interval_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            not_ready_delay_ms: default_not_ready_delay_ms(),
        }
    }
}

impl ControllerSettings {
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            workers: self.workers,
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            max_retries: self.max_retries,
            retry_base: Duration::from_millis(self.retry_base_ms),
            retry_max: Duration::from_millis(self.retry_max_ms),
            not_ready_delay: Duration::from_millis(self.not_ready_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklySettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub account_id: String,
    /// HTTP request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound for a single create/update/delete call
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_sync_timeout_ms() -> u64 {
    5_000
}

impl Default for ChecklySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            account_id: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

impl ChecklySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::OperatorConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "checkop.toml";

    pub fn load_config(path: Option<&str>) -> Result<OperatorConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CHECKOP__CHECKLY__API_KEY=...
        builder = builder.add_source(
            Environment::with_prefix("CHECKOP")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: OperatorConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = OperatorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.controller.domain.as_str(), "k8s.checklyhq.com");
        assert_eq!(cfg.checkly.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.checkly.sync_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_validation_errors() {
        let mut cfg = OperatorConfig::default();
        cfg.controller.workers = 0;
        assert!(cfg.validate().unwrap_err().contains("workers"));

        let mut cfg = OperatorConfig::default();
        cfg.controller.retry_base_ms = 120_000;
        assert!(cfg.validate().unwrap_err().contains("retry_base_ms"));

        let mut cfg = OperatorConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_scheduler_options_from_settings() {
        let settings = ControllerSettings {
            workers: 4,
            not_ready_delay_ms: 250,
            ..Default::default()
        };
        let options = settings.scheduler_options();
        assert_eq!(options.workers, 4);
        assert_eq!(options.not_ready_delay, Duration::from_millis(250));
        assert_eq!(options.resync_interval, Duration::from_secs(300));
    }
}
