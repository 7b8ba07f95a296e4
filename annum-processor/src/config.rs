//! Due processor configuration, sourced from the process environment.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub batch_limit: u32,
    pub lease_duration: Duration,
    pub max_retries: u32,
}

impl ProcessorConfig {
    /// # Errors
    /// Returns an error if an override variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            batch_limit: env_u32("BATCH_LIMIT", 100)?,
            lease_duration: Duration::from_secs(env_u64("LEASE_DURATION_SECS", 300)?),
            max_retries: env_u32("EMAIL_SERVICE_MAX_RETRIES", 3)?,
        })
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_limit: 100,
            lease_duration: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

fn env_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidNumber(name, v)),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidNumber(name, v)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidNumber(&'static str, String),
}
