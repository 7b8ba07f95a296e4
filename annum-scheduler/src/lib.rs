//! Periodic driver: invokes the materialiser and due processor at their
//! configured cron cadences, plus a one-shot startup recovery pass.

pub mod config;
pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};

use annum_common::{MessageType, Signal, UserDirectory};
use annum_delivery::DeliveryClient;
use annum_materialiser::MaterialiserConfig;
use annum_processor::ProcessorConfig;
use annum_store::Store;

pub use config::{parse_schedule, SchedulerConfig};
pub use error::{Result, SchedulerError};

/// Wires the store, user directory, and delivery client into the
/// materialise/process ticks and drives them at their configured cadences.
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<dyn Store>,
    directory: Arc<dyn UserDirectory>,
    delivery: Arc<dyn DeliveryClient>,
    materialiser_config: MaterialiserConfig,
    processor_config: ProcessorConfig,
    scheduler_config: SchedulerConfig,
    message_type: MessageType,
    materialising: Arc<AtomicBool>,
    processing: Arc<AtomicBool>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn UserDirectory>,
        delivery: Arc<dyn DeliveryClient>,
        materialiser_config: MaterialiserConfig,
        processor_config: ProcessorConfig,
        scheduler_config: SchedulerConfig,
        message_type: MessageType,
    ) -> Self {
        Self {
            store,
            directory,
            delivery,
            materialiser_config,
            processor_config,
            scheduler_config,
            message_type,
            materialising: Arc::new(AtomicBool::new(false)),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the startup recovery pass, then drive the periodic loop until a
    /// shutdown signal is received. Waits for any in-flight tick to finish
    /// before returning; schedules no new tick after the signal arrives.
    pub async fn serve(
        self: Arc<Self>,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<()> {
        tracing::info!("running startup recovery pass");
        match annum_processor::process_missed(
            &self.store,
            &self.directory,
            &self.delivery,
            &self.processor_config,
            Utc::now(),
        )
        .await
        {
            Ok(summary) => tracing::info!(?summary, "startup recovery pass complete"),
            Err(err) => tracing::error!(error = %err, "startup recovery pass failed"),
        }

        let materialise_schedule = parse_schedule(&self.scheduler_config.materialise_cron)
            .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;
        let process_schedule = parse_schedule(&self.scheduler_config.process_cron)
            .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let mut next_materialise = next_fire(&materialise_schedule, Utc::now());
        let mut next_process = next_fire(&process_schedule, Utc::now());

        loop {
            tokio::select! {
                () = tokio::time::sleep(duration_until(next_materialise)) => {
                    next_materialise = next_fire(&materialise_schedule, next_materialise);
                    self.spawn_materialise_tick();
                }
                () = tokio::time::sleep(duration_until(next_process)) => {
                    next_process = next_fire(&process_schedule, next_process);
                    self.spawn_process_tick();
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            tracing::info!("scheduler received shutdown signal, draining in-flight ticks");
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "shutdown channel error, stopping scheduler");
                        }
                    }
                    break;
                }
            }
        }

        self.drain(StdDuration::from_secs(30)).await;
        Ok(())
    }

    /// Wait until no tick is in flight, or `timeout` elapses, whichever
    /// comes first.
    async fn drain(&self, timeout: StdDuration) {
        let start = tokio::time::Instant::now();
        while self.materialising.load(Ordering::SeqCst) || self.processing.load(Ordering::SeqCst) {
            if start.elapsed() >= timeout {
                tracing::warn!("drain timeout exceeded, a tick is still in flight at shutdown");
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(50)).await;
        }
    }

    fn spawn_materialise_tick(self: &Arc<Self>) {
        if self.materialising.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous materialise tick still running, skipping this invocation");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = annum_materialiser::materialise_today(
                &this.directory,
                &this.store,
                &this.materialiser_config,
                this.message_type,
                Utc::now(),
            )
            .await;

            match result {
                Ok(count) => tracing::debug!(count, "materialise tick complete"),
                Err(err) => tracing::error!(error = %err, "materialise tick failed"),
            }

            this.materialising.store(false, Ordering::SeqCst);
        });
    }

    fn spawn_process_tick(self: &Arc<Self>) {
        if self.processing.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous process tick still running, skipping this invocation");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = annum_processor::process_due(
                &this.store,
                &this.directory,
                &this.delivery,
                &this.processor_config,
                Utc::now(),
            )
            .await;

            match result {
                Ok(summary) => tracing::debug!(?summary, "process tick complete"),
                Err(err) => tracing::error!(error = %err, "process tick failed"),
            }

            this.processing.store(false, Ordering::SeqCst);
        });
    }
}

fn next_fire(schedule: &cron::Schedule, after: DateTime<Utc>) -> DateTime<Utc> {
    schedule
        .after(&after)
        .next()
        .unwrap_or_else(|| after + chrono::Duration::minutes(1))
}

fn duration_until(target: DateTime<Utc>) -> StdDuration {
    (target - Utc::now())
        .to_std()
        .unwrap_or(StdDuration::from_millis(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_cron_parses_via_parse_schedule() {
        assert!(parse_schedule("*/5 * * * *").is_ok());
        assert!(parse_schedule("0 */5 * * * *").is_ok());
    }

    #[test]
    fn next_fire_advances_past_the_given_instant() {
        let schedule = parse_schedule("* * * * *").unwrap();
        let now = Utc::now();
        let fire = next_fire(&schedule, now);
        assert!(fire > now);
    }
}
