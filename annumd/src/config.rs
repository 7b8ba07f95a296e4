//! Top-level configuration: one sub-config per component, all loaded once
//! at startup from the process environment.

use annum_delivery::DeliveryConfig;
use annum_materialiser::MaterialiserConfig;
use annum_processor::ProcessorConfig;
use annum_scheduler::SchedulerConfig;
use annum_store::StoreConfig;

pub struct Config {
    pub delivery: DeliveryConfig,
    pub store: StoreConfig,
    pub materialiser: MaterialiserConfig,
    pub processor: ProcessorConfig,
    pub scheduler: SchedulerConfig,
    pub user_directory_url: String,
}

impl Config {
    /// # Errors
    /// Returns an error if a required variable is missing or a present
    /// override variable fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            delivery: DeliveryConfig::from_env()?,
            store: store_config_from_env(),
            materialiser: MaterialiserConfig::from_env()?,
            processor: ProcessorConfig::from_env()?,
            scheduler: SchedulerConfig::from_env()?,
            user_directory_url: std::env::var("USER_DIRECTORY_URL")
                .map_err(|_| anyhow::anyhow!("USER_DIRECTORY_URL is required"))?,
        })
    }
}

fn store_config_from_env() -> StoreConfig {
    std::env::var("DATABASE_PATH").map_or(StoreConfig::Memory, |path| StoreConfig::Sqlite { path })
}
