//! Scheduler cadence configuration, sourced from the process environment.

use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub materialise_cron: String,
    pub process_cron: String,
}

impl SchedulerConfig {
    /// # Errors
    /// Returns an error if an override cron expression does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let materialise_cron =
            std::env::var("BIRTHDAY_CHECK_CRON").unwrap_or_else(|_| "*/5 * * * *".to_string());
        let process_cron =
            std::env::var("PROCESS_CHECK_CRON").unwrap_or_else(|_| "* * * * *".to_string());

        parse_schedule(&materialise_cron)
            .map_err(|e| ConfigError::InvalidCron("BIRTHDAY_CHECK_CRON", e.to_string()))?;
        parse_schedule(&process_cron)
            .map_err(|e| ConfigError::InvalidCron("PROCESS_CHECK_CRON", e.to_string()))?;

        Ok(Self {
            materialise_cron,
            process_cron,
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            materialise_cron: "*/5 * * * *".to_string(),
            process_cron: "* * * * *".to_string(),
        }
    }
}

/// The `cron` crate expects a leading seconds field; the configuration
/// table in this codebase's external interface uses classic 5-field unix
/// cron, so a bare 5-field expression has `"0 "` prepended before parsing.
///
/// # Errors
/// Returns an error if, after normalisation, the expression still fails to
/// parse as a valid cron schedule.
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    let normalised = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    cron::Schedule::from_str(&normalised)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid cron expression for {0}: {1}")]
    InvalidCron(&'static str, String),
}
