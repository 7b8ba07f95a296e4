//! Composition root: loads configuration, constructs the store, delivery
//! client, and user directory client, and runs the scheduler until a
//! shutdown signal is received.

mod config;
mod logging;
mod user_directory;

use std::sync::Arc;

use annum_common::{MessageType, Signal, UserDirectory};
use annum_delivery::{DeliveryClient, HttpDeliveryClient};
use annum_scheduler::Scheduler;
use tokio::sync::broadcast;

use config::Config;
use user_directory::HttpUserDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env()?;

    let store = config.store.into_store().await?;
    let delivery: Arc<dyn DeliveryClient> = Arc::new(HttpDeliveryClient::new(config.delivery)?);
    let directory: Arc<dyn UserDirectory> = Arc::new(HttpUserDirectory::new(config.user_directory_url)?);

    let scheduler = Arc::new(Scheduler::new(
        store,
        directory,
        delivery,
        config.materialiser,
        config.processor,
        config.scheduler,
        MessageType::Birthday,
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<Signal>(16);

    let scheduler_handle = tokio::spawn(async move { scheduler.serve(shutdown_rx).await });

    shutdown_signal().await;
    tracing::info!("shutdown requested, notifying scheduler");
    let _ = shutdown_tx.send(Signal::Shutdown);

    match scheduler_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "scheduler exited with an error"),
        Err(join_err) => tracing::error!(error = %join_err, "scheduler task panicked"),
    }

    tracing::info!("annumd shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received ctrl-c");
}
