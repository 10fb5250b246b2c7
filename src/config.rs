//! Application configuration
//!
//! Loaded from an optional YAML file, then overridden from the environment.
//! Every section has defaults, so an empty file (or none) is a valid config.
//!
//! ```yaml
//! data_dir: ./dualstore_data
//! log_level: info
//! coordinator:
//!   primary: graph
//!   write_timeout_ms: 10000
//!   retry:
//!     max_attempts: 4
//!     base_delay_ms: 50
//! verifier:
//!   interval_ms: 30000
//!   grace_ms: 60000
//! generator:
//!   num_users: 100
//!   num_products: 200
//! ```

use crate::adapter::StoreSide;
use crate::coordinator::{CoordinatorSettings, RetryPolicy};
use crate::verifier::VerifierSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value {value:?} for {var}")]
    Env { var: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            factor: policy.factor,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub primary: StoreSide,
    pub write_timeout_ms: u64,
    pub retention_secs: u64,
    pub compensate_on_exhaustion: bool,
    pub retry: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let settings = CoordinatorSettings::default();
        Self {
            primary: settings.primary,
            write_timeout_ms: settings.write_timeout.as_millis() as u64,
            retention_secs: settings.retention.as_secs(),
            compensate_on_exhaustion: settings.compensate_on_exhaustion,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub interval_ms: u64,
    pub grace_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let settings = VerifierSettings::default();
        Self {
            interval_ms: settings.interval.as_millis() as u64,
            grace_ms: settings.grace.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub num_users: usize,
    pub num_products: usize,
    pub max_orders_per_user: usize,
    pub max_reviews_per_product: usize,
    /// Fixed seed for reproducible data; random when absent
    pub seed: Option<u64>,
    /// Concurrent coordinator writes while loading
    pub batch_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_users: 100,
            num_products: 200,
            max_orders_per_user: 5,
            max_reviews_per_product: 10,
            seed: None,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root for `graph/` (WAL) and `tabular/` (RocksDB)
    pub data_dir: PathBuf,
    pub log_level: String,
    /// fsync the graph WAL on every append
    pub wal_sync: bool,
    pub coordinator: CoordinatorConfig,
    pub verifier: VerifierConfig,
    pub generator: GeneratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dualstore_data"),
            log_level: "info".to_string(),
            wal_sync: false,
            coordinator: CoordinatorConfig::default(),
            verifier: VerifierConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

fn parse_env<T: FromStr>(var: &str, value: String) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value,
    })
}

impl AppConfig {
    /// Defaults, overlaid with the YAML file at `path` if given, then with
    /// the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup` (the environment in [`AppConfig::load`])
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DUALSTORE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("DUALSTORE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(primary) = lookup("DUALSTORE_PRIMARY") {
            self.coordinator.primary = parse_env("DUALSTORE_PRIMARY", primary)?;
        }
        if let Some(n) = lookup("NUM_USERS") {
            self.generator.num_users = parse_env("NUM_USERS", n)?;
        }
        if let Some(n) = lookup("NUM_PRODUCTS") {
            self.generator.num_products = parse_env("NUM_PRODUCTS", n)?;
        }
        if let Some(n) = lookup("MAX_ORDERS_PER_USER") {
            self.generator.max_orders_per_user = parse_env("MAX_ORDERS_PER_USER", n)?;
        }
        if let Some(n) = lookup("MAX_REVIEWS_PER_PRODUCT") {
            self.generator.max_reviews_per_product = parse_env("MAX_REVIEWS_PER_PRODUCT", n)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let retry = &self.coordinator.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(retry.factor >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.factor must be >= 1.0, got {}",
                retry.factor
            )));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms is below retry.base_delay_ms".into(),
            ));
        }
        if self.coordinator.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("coordinator.write_timeout_ms must be positive".into()));
        }
        if self.verifier.interval_ms == 0 {
            return Err(ConfigError::Invalid("verifier.interval_ms must be positive".into()));
        }
        if self.generator.batch_size == 0 {
            return Err(ConfigError::Invalid("generator.batch_size must be positive".into()));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> ConfigResult<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
    }

    pub fn graph_path(&self) -> PathBuf {
        self.data_dir.join("graph")
    }

    pub fn tabular_path(&self) -> PathBuf {
        self.data_dir.join("tabular")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.coordinator.retry;
        RetryPolicy {
            max_attempts: retry.max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            factor: retry.factor,
            max_delay: Duration::from_millis(retry.max_delay_ms),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            primary: self.coordinator.primary,
            retry: self.retry_policy(),
            write_timeout: Duration::from_millis(self.coordinator.write_timeout_ms),
            retention: Duration::from_secs(self.coordinator.retention_secs),
            compensate_on_exhaustion: self.coordinator.compensate_on_exhaustion,
        }
    }

    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            interval: Duration::from_millis(self.verifier.interval_ms),
            grace: Duration::from_millis(self.verifier.grace_ms),
        }
    }
}
