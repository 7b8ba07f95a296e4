//! Materialiser configuration, sourced from the process environment.

/// Controls the local hour/minute at which messages are scheduled to send.
#[derive(Debug, Clone)]
pub struct MaterialiserConfig {
    pub message_hour: u32,
    pub message_minute: u32,
}

impl MaterialiserConfig {
    /// # Errors
    /// Returns an error if an override variable is set but cannot be parsed,
    /// or parses to an out-of-range hour/minute.
    pub fn from_env() -> Result<Self, ConfigError> {
        let message_hour = env_u32("BIRTHDAY_MESSAGE_HOUR", 9)?;
        let message_minute = env_u32("BIRTHDAY_MESSAGE_MINUTE", 0)?;

        if message_hour > 23 {
            return Err(ConfigError::OutOfRange("BIRTHDAY_MESSAGE_HOUR", message_hour));
        }
        if message_minute > 59 {
            return Err(ConfigError::OutOfRange("BIRTHDAY_MESSAGE_MINUTE", message_minute));
        }

        Ok(Self {
            message_hour,
            message_minute,
        })
    }
}

impl Default for MaterialiserConfig {
    fn default() -> Self {
        Self {
            message_hour: 9,
            message_minute: 0,
        }
    }
}

fn env_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.parse().map_err(|_| ConfigError::InvalidNumber(name, v)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("{0} out of range: {1}")]
    OutOfRange(&'static str, u32),
}
