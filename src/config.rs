//! Configuration management for the runshed service

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,

    /// Program invoked for every job, as argv words. Parameter-derived
    /// flags are appended after these words.
    pub program: Vec<String>,
    pub working_dir: Option<String>,

    /// Execution settings
    pub job_timeout_ms: Option<u64>,

    /// Retention settings
    pub retention_seconds: u64,
    pub sweep_interval_seconds: u64,

    /// Logging settings
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            program: vec!["python3".to_string(), "main.py".to_string()],
            working_dir: None,
            job_timeout_ms: None,
            retention_seconds: 24 * 60 * 60,
            sweep_interval_seconds: 60,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(port) = env::var("RUNSHED_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid("RUNSHED_PORT".to_string()))?;
        }

        // Whitespace-split argv, no shell quoting.
        if let Ok(program) = env::var("RUNSHED_PROGRAM") {
            config.program = program.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(dir) = env::var("RUNSHED_WORKING_DIR") {
            config.working_dir = Some(dir);
        }

        if let Ok(timeout) = env::var("RUNSHED_JOB_TIMEOUT_MS") {
            config.job_timeout_ms = Some(
                timeout
                    .parse()
                    .map_err(|_| ConfigError::Invalid("RUNSHED_JOB_TIMEOUT_MS".to_string()))?,
            );
        }

        if let Ok(retention) = env::var("RUNSHED_RETENTION_SECONDS") {
            config.retention_seconds = retention
                .parse()
                .map_err(|_| ConfigError::Invalid("RUNSHED_RETENTION_SECONDS".to_string()))?;
        }

        if let Ok(interval) = env::var("RUNSHED_SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval_seconds = interval.parse().map_err(|_| {
                ConfigError::Invalid("RUNSHED_SWEEP_INTERVAL_SECONDS".to_string())
            })?;
        }

        if let Ok(level) = env::var("RUNSHED_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.is_empty() {
            return Err(ConfigError::Missing("RUNSHED_PROGRAM".to_string()));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_seconds cannot be 0".to_string(),
            ));
        }

        if let Some(0) = self.job_timeout_ms {
            return Err(ConfigError::Invalid(
                "job_timeout_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}
