//! Drives due [`annum_store::Store`] records through delivery: lease, send,
//! terminal status transition, best-effort lease release on the way out.

pub mod config;
pub mod error;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use annum_common::{ScheduledMessage, ScheduledMessageStatus, UserDirectory};
use annum_delivery::DeliveryClient;
use annum_store::Store;

pub use config::ProcessorConfig;
pub use error::{ProcessorError, Result};

/// Outcome counters for one `process_due`/`process_missed` invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub considered: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Process every record currently due (`status ∈ {Pending, Retry}`,
/// `scheduled_at <= now`, unleased).
pub async fn process_due(
    store: &Arc<dyn Store>,
    directory: &Arc<dyn UserDirectory>,
    delivery: &Arc<dyn DeliveryClient>,
    config: &ProcessorConfig,
    now: DateTime<Utc>,
) -> Result<ProcessSummary> {
    let records = store.select_due(now, config.batch_limit).await?;
    Ok(process_records(store, directory, delivery, config, now, records).await)
}

/// Startup recovery sweep: every due-candidate record with `scheduled_at`
/// strictly in the past, regardless of lease state at query time. Run once
/// before a replica enters its periodic loop, via the same per-record
/// pipeline as a regular tick.
pub async fn process_missed(
    store: &Arc<dyn Store>,
    directory: &Arc<dyn UserDirectory>,
    delivery: &Arc<dyn DeliveryClient>,
    config: &ProcessorConfig,
    now: DateTime<Utc>,
) -> Result<ProcessSummary> {
    let records = store.list_missed(now).await?;
    Ok(process_records(store, directory, delivery, config, now, records).await)
}

async fn process_records(
    store: &Arc<dyn Store>,
    directory: &Arc<dyn UserDirectory>,
    delivery: &Arc<dyn DeliveryClient>,
    config: &ProcessorConfig,
    now: DateTime<Utc>,
    records: Vec<ScheduledMessage>,
) -> ProcessSummary {
    let mut summary = ProcessSummary {
        considered: records.len(),
        ..ProcessSummary::default()
    };

    for record in records {
        match process_one(store, directory, delivery, config, now, &record).await {
            Ok(Outcome::Sent) => summary.sent += 1,
            Ok(Outcome::Retried) => summary.retried += 1,
            Ok(Outcome::Failed) => summary.failed += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(err) => {
                tracing::warn!(
                    record = %record.id,
                    user = %record.user_id,
                    error = %err,
                    "unexpected error processing record, lease released"
                );
                summary.skipped += 1;
            }
        }
    }

    summary
}

enum Outcome {
    Sent,
    Retried,
    Failed,
    /// Skipped for a benign reason (lost the lease race, user vanished) —
    /// not an error, nothing to release.
    Skipped,
}

async fn process_one(
    store: &Arc<dyn Store>,
    directory: &Arc<dyn UserDirectory>,
    delivery: &Arc<dyn DeliveryClient>,
    config: &ProcessorConfig,
    now: DateTime<Utc>,
    record: &ScheduledMessage,
) -> Result<Outcome> {
    let lock_id = ulid::Ulid::new().to_string();
    let lease_until = now + chrono::Duration::from_std(config.lease_duration)
        .unwrap_or_else(|_| chrono::Duration::seconds(300));

    if !store.acquire_lease(&record.id, &lock_id, lease_until, now).await? {
        return Ok(Outcome::Skipped);
    }

    match drive_leased_record(store, directory, delivery, config, &lock_id, record).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            // Best-effort release so the record isn't stuck until the lease
            // expires on its own; the lease is the ultimate safety net if
            // this also fails.
            if let Err(release_err) = store.release_lease(&record.id, &lock_id).await {
                tracing::warn!(
                    record = %record.id,
                    error = %release_err,
                    "failed to release lease after processing error"
                );
            }
            Err(err)
        }
    }
}

async fn drive_leased_record(
    store: &Arc<dyn Store>,
    directory: &Arc<dyn UserDirectory>,
    delivery: &Arc<dyn DeliveryClient>,
    config: &ProcessorConfig,
    lock_id: &str,
    record: &ScheduledMessage,
) -> Result<Outcome> {
    let Some(record) = store.find_by_id(&record.id).await? else {
        return Ok(Outcome::Skipped);
    };

    let Some(user) = directory.find_by_id(&record.user_id).await? else {
        tracing::warn!(
            record = %record.id,
            user = %record.user_id,
            "user no longer exists, releasing lease without delivering"
        );
        store.release_lease(&record.id, lock_id).await?;
        return Ok(Outcome::Skipped);
    };

    match delivery.send(&user.email, &record.message_body).await {
        Ok(()) => {
            store.mark_sent(&record.id, lock_id, Utc::now()).await?;
            Ok(Outcome::Sent)
        }
        Err(err) => {
            let next_retry_count = record.retry_count + 1;
            let (new_status, persisted_retry_count) = if next_retry_count <= config.max_retries {
                (ScheduledMessageStatus::Retry, next_retry_count)
            } else {
                (ScheduledMessageStatus::Failed, record.retry_count)
            };

            store
                .mark_failure(
                    &record.id,
                    lock_id,
                    new_status,
                    persisted_retry_count,
                    &err.to_string(),
                )
                .await?;

            Ok(match new_status {
                ScheduledMessageStatus::Retry => Outcome::Retried,
                _ => Outcome::Failed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use annum_common::{CoreError, MessageType, User, UserId};
    use annum_delivery::{DeliveryError, MockDeliveryClient, TerminalError};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    #[derive(Debug)]
    struct FixedDirectory(Vec<User>);

    #[async_trait]
    impl UserDirectory for FixedDirectory {
        async fn list_active(&self) -> std::result::Result<Vec<User>, CoreError> {
            Ok(self.0.clone())
        }

        async fn find_by_id(&self, id: &UserId) -> std::result::Result<Option<User>, CoreError> {
            Ok(self.0.iter().find(|u| &u.id == id).cloned())
        }
    }

    fn john() -> User {
        User {
            id: UserId::new("user-1"),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john@example.com".to_string(),
            anchor: NaiveDate::from_ymd_opt(1990, 5, 15).unwrap(),
            timezone: "America/New_York".to_string(),
            active: true,
        }
    }

    async fn seeded_store(user: &User, now: DateTime<Utc>) -> Arc<dyn Store> {
        let store: Arc<dyn Store> = Arc::new(annum_store::MemoryStore::new());
        store
            .create_if_absent(
                &user.id,
                MessageType::Birthday,
                now.date_naive(),
                now,
                "Hey, John Doe it's your birthday",
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn happy_path_marks_sent() {
        let user = john();
        let now = Utc::now();
        let store = seeded_store(&user, now).await;
        let directory: Arc<dyn UserDirectory> = Arc::new(FixedDirectory(vec![user]));
        let mock = MockDeliveryClient::new();
        mock.push_response(Ok(()));
        let delivery: Arc<dyn DeliveryClient> = Arc::new(mock);
        let config = ProcessorConfig::default();

        let summary = process_due(&store, &directory, &delivery, &config, now).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.considered, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_mark_failed() {
        let user = john();
        let now = Utc::now();
        let store = seeded_store(&user, now).await;
        let directory: Arc<dyn UserDirectory> = Arc::new(FixedDirectory(vec![user]));
        let mock = MockDeliveryClient::new();
        mock.push_response(Err(DeliveryError::Terminal(TerminalError::Rejected {
            status: 500,
            body: "boom".into(),
        })));
        let delivery: Arc<dyn DeliveryClient> = Arc::new(mock);
        let mut config = ProcessorConfig::default();
        config.max_retries = 1;

        let summary = process_due(&store, &directory, &delivery, &config, now).await.unwrap();
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn vanished_user_releases_lease_without_delivering() {
        let user = john();
        let now = Utc::now();
        let store = seeded_store(&user, now).await;
        let directory: Arc<dyn UserDirectory> = Arc::new(FixedDirectory(vec![]));
        let delivery: Arc<dyn DeliveryClient> = Arc::new(MockDeliveryClient::new());
        let config = ProcessorConfig::default();

        let summary = process_due(&store, &directory, &delivery, &config, now).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(MockDeliveryClient::new().call_count(), 0);
    }
}
