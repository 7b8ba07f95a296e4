//! Delivery client configuration, sourced from the process environment.

use std::time::Duration;

/// Configuration for the HTTP delivery client.
///
/// Every field has a default matching the configuration table this service
/// ships with; only `email_service_url` is required.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub email_service_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset: Duration,
}

impl DeliveryConfig {
    /// Load from environment variables.
    ///
    /// `EMAIL_SERVICE_URL` is required; the rest fall back to documented
    /// defaults (timeout 10s, max retries 3, retry base delay 2s, circuit
    /// breaker threshold 5, circuit breaker reset 60s).
    ///
    /// # Errors
    /// Returns an error if `EMAIL_SERVICE_URL` is unset, or if a numeric
    /// override variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let email_service_url =
            std::env::var("EMAIL_SERVICE_URL").map_err(|_| ConfigError::MissingUrl)?;

        Ok(Self {
            email_service_url,
            timeout: Duration::from_millis(env_u64("EMAIL_SERVICE_TIMEOUT", 10_000)?),
            max_retries: env_u32("EMAIL_SERVICE_MAX_RETRIES", 3)?,
            retry_base_delay: Duration::from_millis(env_u64("EMAIL_SERVICE_RETRY_DELAY", 2_000)?),
            circuit_breaker_threshold: env_u32("CIRCUIT_BREAKER_THRESHOLD", 5)?,
            circuit_breaker_reset: Duration::from_millis(env_u64(
                "CIRCUIT_BREAKER_RESET_MS",
                60_000,
            )?),
        })
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name.to_string(), v)),
        Err(_) => Ok(default),
    }
}

fn env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name.to_string(), v)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("EMAIL_SERVICE_URL is required")]
    MissingUrl,

    #[error("invalid value for {0}: {1}")]
    InvalidNumber(String, String),
}
