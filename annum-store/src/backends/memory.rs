//! In-memory store, primarily for tests.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use annum_common::{
    MessageType, ScheduledMessage, ScheduledMessageId, ScheduledMessageStatus, UserId,
};

use crate::{error::StoreError, store::Store, Result};

type Key = (UserId, MessageType, NaiveDate);

#[derive(Debug, Default)]
struct Inner {
    messages: HashMap<ScheduledMessageId, ScheduledMessage>,
    index: HashMap<Key, ScheduledMessageId>,
}

/// In-memory backing store.
///
/// Uses a single `RwLock` over a `HashMap`, matching the concurrency model
/// of a single-process test double rather than a production backend: the
/// lock is only ever held for the duration of a map lookup/mutation, never
/// across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record currently held, for assertions in tests.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ScheduledMessage> {
        self.inner
            .read()
            .expect("MemoryStore lock poisoned")
            .messages
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_if_absent(
        &self,
        user_id: &UserId,
        message_type: MessageType,
        scheduled_date: NaiveDate,
        scheduled_at: DateTime<Utc>,
        message_body: &str,
    ) -> Result<ScheduledMessage> {
        let key = (user_id.clone(), message_type, scheduled_date);
        let mut inner = self.inner.write().map_err(poison)?;

        if let Some(id) = inner.index.get(&key) {
            return Ok(inner.messages[id].clone());
        }

        let record = ScheduledMessage {
            id: ScheduledMessageId::generate(),
            user_id: user_id.clone(),
            message_type,
            message_body: message_body.to_string(),
            status: ScheduledMessageStatus::Pending,
            scheduled_date,
            scheduled_at,
            sent_at: None,
            retry_count: 0,
            error_message: None,
            lock_id: None,
            locked_until: None,
            created_at: Utc::now(),
        };

        inner.index.insert(key, record.id);
        inner.messages.insert(record.id, record.clone());
        Ok(record)
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledMessage>> {
        let inner = self.inner.read().map_err(poison)?;
        let mut due: Vec<_> = inner
            .messages
            .values()
            .filter(|m| m.status.is_due_candidate() && m.scheduled_at <= now && !m.is_locked(now))
            .cloned()
            .collect();
        due.sort_by_key(|m| m.scheduled_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn list_missed(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledMessage>> {
        let inner = self.inner.read().map_err(poison)?;
        let mut missed: Vec<_> = inner
            .messages
            .values()
            .filter(|m| m.status.is_due_candidate() && m.scheduled_at < now)
            .cloned()
            .collect();
        missed.sort_by_key(|m| m.scheduled_at);
        Ok(missed)
    }

    async fn acquire_lease(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison)?;
        let Some(record) = inner.messages.get_mut(id) else {
            return Err(StoreError::NotFound(*id));
        };

        if record.is_locked(now) {
            return Ok(false);
        }

        record.lock_id = Some(lock_id.to_string());
        record.locked_until = Some(lease_until);
        Ok(true)
    }

    async fn mark_sent(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison)?;
        let Some(record) = inner.messages.get_mut(id) else {
            return Err(StoreError::NotFound(*id));
        };

        if record.lock_id.as_deref() != Some(lock_id) {
            return Ok(false);
        }

        record.status = ScheduledMessageStatus::Sent;
        record.sent_at = Some(sent_at);
        record.lock_id = None;
        record.locked_until = None;
        Ok(true)
    }

    async fn mark_failure(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        new_status: ScheduledMessageStatus,
        retry_count: u32,
        error_message: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison)?;
        let Some(record) = inner.messages.get_mut(id) else {
            return Err(StoreError::NotFound(*id));
        };

        if record.lock_id.as_deref() != Some(lock_id) {
            return Ok(false);
        }

        record.status = new_status;
        record.retry_count = retry_count;
        record.error_message = Some(error_message.to_string());
        record.lock_id = None;
        record.locked_until = None;
        Ok(true)
    }

    async fn release_lease(&self, id: &ScheduledMessageId, lock_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison)?;
        let Some(record) = inner.messages.get_mut(id) else {
            return Err(StoreError::NotFound(*id));
        };

        if record.lock_id.as_deref() != Some(lock_id) {
            return Ok(false);
        }

        record.lock_id = None;
        record.locked_until = None;
        Ok(true)
    }

    async fn find_by_id(&self, id: &ScheduledMessageId) -> Result<Option<ScheduledMessage>> {
        let inner = self.inner.read().map_err(poison)?;
        Ok(inner.messages.get(id).cloned())
    }
}

fn poison<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Internal("MemoryStore lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use annum_common::UserId;

    fn user(n: &str) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let at = Utc::now();

        let first = store
            .create_if_absent(&user("u1"), MessageType::Birthday, date, at, "hi")
            .await
            .unwrap();
        let second = store
            .create_if_absent(&user("u1"), MessageType::Birthday, date, at, "hi again")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.message_body, "hi");
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn acquire_lease_rejects_concurrent_holder() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let now = Utc::now();
        let record = store
            .create_if_absent(&user("u1"), MessageType::Birthday, date, now, "hi")
            .await
            .unwrap();

        let lease_until = now + chrono::Duration::minutes(5);
        let won = store
            .acquire_lease(&record.id, "lock-a", lease_until, now)
            .await
            .unwrap();
        assert!(won);

        let lost = store
            .acquire_lease(&record.id, "lock-b", lease_until, now)
            .await
            .unwrap();
        assert!(!lost);

        // After expiry, a new lease can be taken.
        let later = lease_until + chrono::Duration::seconds(1);
        let retaken = store
            .acquire_lease(&record.id, "lock-b", lease_until, later)
            .await
            .unwrap();
        assert!(retaken);
    }

    #[tokio::test]
    async fn mark_sent_requires_matching_lease() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let now = Utc::now();
        let record = store
            .create_if_absent(&user("u1"), MessageType::Birthday, date, now, "hi")
            .await
            .unwrap();

        store
            .acquire_lease(&record.id, "lock-a", now + chrono::Duration::minutes(5), now)
            .await
            .unwrap();

        let wrong = store.mark_sent(&record.id, "lock-b", now).await.unwrap();
        assert!(!wrong);

        let right = store.mark_sent(&record.id, "lock-a", now).await.unwrap();
        assert!(right);

        let found = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(found.status, ScheduledMessageStatus::Sent);
        assert!(found.lock_id.is_none());
    }
}
