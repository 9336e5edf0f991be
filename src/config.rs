//! Runtime configuration.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::plan::{DEFAULT_REPLICATION_FACTOR, DEFAULT_TIME_PARTITION_INTERVAL_MS, DEFAULT_TTL_MS};

/// The default port of the metrics server.
pub const DEFAULT_METRICS_PORT: u16 = 7002;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The server's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,

    /// The path to the database on disk.
    #[serde(default = "crate::database::default_data_path")]
    pub storage_data_path: String,

    /// The port on which the Prometheus metrics server listens.
    #[serde(default = "Config::default_metrics_port")]
    pub metrics_port: u16,
    /// Whether the metrics recorder and server are enabled.
    #[serde(default = "Config::default_enable_metrics")]
    pub enable_metrics: bool,

    /// The TTL of storage groups created without an explicit TTL.
    #[serde(default = "Config::default_ttl_ms")]
    pub default_ttl_ms: i64,
    /// The schema region replication factor of storage groups created without an explicit value.
    #[serde(default = "Config::default_replication_factor")]
    pub default_schema_replication_factor: u32,
    /// The data region replication factor of storage groups created without an explicit value.
    #[serde(default = "Config::default_replication_factor")]
    pub default_data_replication_factor: u32,
    /// The time partition interval of storage groups created without an explicit value.
    #[serde(default = "Config::default_time_partition_interval_ms")]
    pub default_time_partition_interval_ms: i64,
}

impl Config {
    /// Create a new config instance from the runtime environment.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the storage group defaults of this config.
    ///
    /// The defaults are resolved into plans before they are committed, so an invalid value is
    /// rejected at startup rather than by every submission.
    pub fn validate(&self) -> Result<()> {
        if self.default_schema_replication_factor == 0 {
            bail!("DEFAULT_SCHEMA_REPLICATION_FACTOR must be at least 1");
        }
        if self.default_data_replication_factor == 0 {
            bail!("DEFAULT_DATA_REPLICATION_FACTOR must be at least 1");
        }
        if self.default_time_partition_interval_ms <= 0 {
            bail!("DEFAULT_TIME_PARTITION_INTERVAL_MS must be positive");
        }
        Ok(())
    }

    fn default_metrics_port() -> u16 {
        DEFAULT_METRICS_PORT
    }

    fn default_enable_metrics() -> bool {
        true
    }

    fn default_ttl_ms() -> i64 {
        DEFAULT_TTL_MS
    }

    fn default_replication_factor() -> u32 {
        DEFAULT_REPLICATION_FACTOR
    }

    fn default_time_partition_interval_ms() -> i64 {
        DEFAULT_TIME_PARTITION_INTERVAL_MS
    }

    /// Build a config for testing, backed by a temporary data directory.
    ///
    /// The returned directory is removed when dropped, so keep it alive for the test's duration.
    #[cfg(test)]
    pub fn new_test() -> Result<(std::sync::Arc<Self>, tempfile::TempDir)> {
        let tmpdir = tempfile::tempdir().context("error creating tmp dir for test config")?;
        let config = Self {
            rust_log: "".into(),
            storage_data_path: tmpdir.path().to_string_lossy().to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            enable_metrics: false,
            default_ttl_ms: DEFAULT_TTL_MS,
            default_schema_replication_factor: DEFAULT_REPLICATION_FACTOR,
            default_data_replication_factor: DEFAULT_REPLICATION_FACTOR,
            default_time_partition_interval_ms: DEFAULT_TIME_PARTITION_INTERVAL_MS,
        };
        Ok((std::sync::Arc::new(config), tmpdir))
    }
}
