//! Service configuration loaded from a TOML file plus environment overrides.

use crate::core::observer::DEFAULT_RESULT_CAPACITY;
use crate::error::ConfigError;
use crate::jobs::queue::DEFAULT_STAGE_CAPACITY;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_DATABASE_PATH: &str = "fairshares.db";
pub const FLEXPOOL_POOL_NAME: &str = "flexpool";
pub const FLEXPOOL_API_ENDPOINT: &str = "https://api.flexpool.io/v2";
pub const FLEXPOOL_PAGE_URL: &str = "https://www.flexpool.io/miner/eth";
pub const MAILJET_API_URL: &str = "https://api.mailjet.com";

/// Deployment environment, read from `ENVIRONMENT` (defaults to `sandbox`).
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_config_path() -> String {
    env::var("FAIRSHARES_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub flexpool: FlexpoolConfig,
    #[serde(default)]
    pub mailjet: MailjetConfig,
    #[serde(default, rename = "worker")]
    pub workers: Vec<WorkerContact>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlexpoolConfig {
    pub address: String,
    #[serde(default = "default_flexpool_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_coin")]
    pub coin: String,
    #[serde(default = "default_page_url")]
    pub page_url: String,
}

/// Mailjet credentials. Notifications are disabled unless all three are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailjetConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl MailjetConfig {
    pub fn is_configured(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty() && !self.email.is_empty()
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(MAILJET_API_URL)
    }
}

/// A monitored rig and the address notified when it goes offline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerContact {
    pub name: String,
    pub notify: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyFailurePolicy {
    /// Log the failure and keep going.
    #[default]
    Log,
    /// Request a graceful shutdown of the whole service.
    Shutdown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub worker_interval_secs: u64,
    pub balance_interval_secs: u64,
    pub worker_pool_size: usize,
    pub pacing_secs: u64,
    pub fetch_timeout_secs: u64,
    pub queue_capacity: usize,
    pub result_capacity: usize,
    pub drain_grace_secs: u64,
    pub notify_failure: NotifyFailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_interval_secs: 30 * 60,
            balance_interval_secs: 10 * 60,
            worker_pool_size: 1,
            pacing_secs: 2,
            fetch_timeout_secs: 10,
            queue_capacity: DEFAULT_STAGE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            drain_grace_secs: 15,
            notify_failure: NotifyFailurePolicy::Log,
        }
    }
}

impl SchedulerConfig {
    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }

    pub fn balance_interval(&self) -> Duration {
        Duration::from_secs(self.balance_interval_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    pub port: Option<u16>,
}

fn default_database() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_flexpool_endpoint() -> String {
    FLEXPOOL_API_ENDPOINT.to_string()
}

fn default_coin() -> String {
    "eth".to_string()
}

fn default_page_url() -> String {
    FLEXPOOL_PAGE_URL.to_string()
}

impl Config {
    /// Load the config file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml(&raw)?;
        if let Ok(database) = env::var("DATABASE_PATH") {
            config.database = database;
        }
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flexpool.address.trim().is_empty() {
            return Err(ConfigError::Invalid("flexpool.address must not be empty".into()));
        }

        let s = &self.scheduler;
        if s.worker_interval_secs == 0 || s.balance_interval_secs == 0 {
            return Err(ConfigError::Invalid("ticker intervals must be > 0".into()));
        }
        if s.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("scheduler.fetch_timeout_secs must be > 0".into()));
        }
        if s.worker_pool_size == 0 {
            return Err(ConfigError::Invalid("scheduler.worker_pool_size must be > 0".into()));
        }
        if s.queue_capacity == 0 || s.result_capacity == 0 {
            return Err(ConfigError::Invalid("channel capacities must be > 0".into()));
        }

        for worker in &self.workers {
            if worker.name.is_empty() {
                return Err(ConfigError::Invalid("worker.name must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Pool names whose addresses are enumerated on every tick.
    pub fn tracked_pools(&self) -> Vec<String> {
        vec![FLEXPOOL_POOL_NAME.to_string()]
    }
}
