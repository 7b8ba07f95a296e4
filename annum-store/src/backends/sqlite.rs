//! SQLite-backed store (production).
//!
//! Runs in WAL mode so writers don't block readers, and leans on SQLite's
//! single-writer serialization plus conditional `UPDATE ... WHERE` clauses
//! for the compare-and-swap semantics `acquire_lease`/`mark_sent`/
//! `mark_failure` need — no explicit application-level locking required.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};

use annum_common::{
    MessageType, ScheduledMessage, ScheduledMessageId, ScheduledMessageStatus, UserId,
};

use crate::{error::StoreError, store::Store, Result};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if necessary) a WAL-mode SQLite database at `path`
    /// and run embedded migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledMessage> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let message_type: String = row.try_get("message_type")?;
        let scheduled_date: String = row.try_get("scheduled_date")?;
        let scheduled_at: String = row.try_get("scheduled_at")?;
        let sent_at: Option<String> = row.try_get("sent_at")?;
        let locked_until: Option<String> = row.try_get("locked_until")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(ScheduledMessage {
            id: id
                .parse()
                .map_err(|e| StoreError::Internal(format!("bad id: {e}")))?,
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            message_type: parse_message_type(&message_type)?,
            message_body: row.try_get("message_body")?,
            status: status
                .parse()
                .map_err(|e: annum_common::CoreError| StoreError::Internal(e.to_string()))?,
            scheduled_date: NaiveDate::parse_from_str(&scheduled_date, "%Y-%m-%d")
                .map_err(|e| StoreError::Internal(format!("bad scheduled_date: {e}")))?,
            scheduled_at: parse_ts(&scheduled_at)?,
            sent_at: sent_at.as_deref().map(parse_ts).transpose()?,
            retry_count: u32::try_from(row.try_get::<i64, _>("retry_count")?)
                .map_err(|e| StoreError::Internal(e.to_string()))?,
            error_message: row.try_get("error_message")?,
            lock_id: row.try_get("lock_id")?,
            locked_until: locked_until.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&created_at)?,
        })
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("bad timestamp {s}: {e}")))
}

fn parse_message_type(s: &str) -> Result<MessageType> {
    match s {
        "birthday" => Ok(MessageType::Birthday),
        "anniversary" => Ok(MessageType::Anniversary),
        other => Err(StoreError::Internal(format!("unknown message_type: {other}"))),
    }
}

const fn message_type_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Birthday => "birthday",
        MessageType::Anniversary => "anniversary",
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_if_absent(
        &self,
        user_id: &UserId,
        message_type: MessageType,
        scheduled_date: NaiveDate,
        scheduled_at: DateTime<Utc>,
        message_body: &str,
    ) -> Result<ScheduledMessage> {
        let id = ScheduledMessageId::generate();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO scheduled_messages \
             (id, user_id, message_type, message_body, status, scheduled_date, scheduled_at, \
              retry_count, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?, ?, 0, ?) \
             ON CONFLICT(user_id, message_type, scheduled_date) DO NOTHING",
        )
        .bind(id.to_string())
        .bind(user_id.as_str())
        .bind(message_type_str(message_type))
        .bind(message_body)
        .bind(scheduled_date.format("%Y-%m-%d").to_string())
        .bind(scheduled_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT * FROM scheduled_messages \
             WHERE user_id = ? AND message_type = ? AND scheduled_date = ?",
        )
        .bind(user_id.as_str())
        .bind(message_type_str(message_type))
        .bind(scheduled_date.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_message(&row)
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM scheduled_messages \
             WHERE status IN ('pending', 'retry') \
               AND scheduled_at <= ? \
               AND (locked_until IS NULL OR locked_until <= ?) \
             ORDER BY scheduled_at ASC \
             LIMIT ?",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn list_missed(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM scheduled_messages \
             WHERE status IN ('pending', 'retry') AND scheduled_at < ? \
             ORDER BY scheduled_at ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn acquire_lease(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_messages SET lock_id = ?, locked_until = ? \
             WHERE id = ? AND (locked_until IS NULL OR locked_until <= ?)",
        )
        .bind(lock_id)
        .bind(lease_until.to_rfc3339())
        .bind(id.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_sent(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_messages \
             SET status = 'sent', sent_at = ?, lock_id = NULL, locked_until = NULL \
             WHERE id = ? AND lock_id = ?",
        )
        .bind(sent_at.to_rfc3339())
        .bind(id.to_string())
        .bind(lock_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failure(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        new_status: ScheduledMessageStatus,
        retry_count: u32,
        error_message: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_messages \
             SET status = ?, retry_count = ?, error_message = ?, \
                 lock_id = NULL, locked_until = NULL \
             WHERE id = ? AND lock_id = ?",
        )
        .bind(new_status.as_str())
        .bind(i64::from(retry_count))
        .bind(error_message)
        .bind(id.to_string())
        .bind(lock_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lease(&self, id: &ScheduledMessageId, lock_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_messages SET lock_id = NULL, locked_until = NULL \
             WHERE id = ? AND lock_id = ?",
        )
        .bind(id.to_string())
        .bind(lock_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &ScheduledMessageId) -> Result<Option<ScheduledMessage>> {
        let row = sqlx::query("SELECT * FROM scheduled_messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_message).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let store = memory_db().await;
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let at = Utc::now();
        let user_id = UserId::new("u1");

        let first = store
            .create_if_absent(&user_id, MessageType::Birthday, date, at, "hi")
            .await
            .unwrap();
        let second = store
            .create_if_absent(&user_id, MessageType::Birthday, date, at, "different body")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.message_body, "hi");
    }

    #[tokio::test]
    async fn lease_cas_prevents_double_acquire() {
        let store = memory_db().await;
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let now = Utc::now();
        let record = store
            .create_if_absent(&UserId::new("u1"), MessageType::Birthday, date, now, "hi")
            .await
            .unwrap();

        let lease_until = now + chrono::Duration::minutes(5);
        assert!(store
            .acquire_lease(&record.id, "lock-a", lease_until, now)
            .await
            .unwrap());
        assert!(!store
            .acquire_lease(&record.id, "lock-b", lease_until, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mark_sent_requires_matching_lease() {
        let store = memory_db().await;
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let now = Utc::now();
        let record = store
            .create_if_absent(&UserId::new("u1"), MessageType::Birthday, date, now, "hi")
            .await
            .unwrap();

        store
            .acquire_lease(&record.id, "lock-a", now + chrono::Duration::minutes(5), now)
            .await
            .unwrap();

        assert!(!store.mark_sent(&record.id, "lock-b", now).await.unwrap());
        assert!(store.mark_sent(&record.id, "lock-a", now).await.unwrap());

        let found = store.find_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(found.status, ScheduledMessageStatus::Sent);
    }
}
