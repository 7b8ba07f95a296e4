//! The [`Store`] trait: durable persistence for scheduled messages.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use annum_common::{MessageType, ScheduledMessage, ScheduledMessageId, ScheduledMessageStatus, UserId};

use crate::Result;

/// Durable storage for scheduled recurring-event messages.
///
/// Implementations must uphold the identity and lease invariants the
/// scheduling core relies on:
///
/// - `(user_id, message_type, scheduled_date)` is unique; `create_if_absent`
///   is the only insertion path and is idempotent under concurrent callers.
/// - A lease is valid iff `lock_id` is set and `locked_until` is in the
///   future; `acquire_lease` must be an atomic compare-and-swap so two
///   replicas racing for the same record can never both win.
/// - `Sent` records never transition again.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Insert a new scheduled message if no record exists yet for
    /// `(user_id, message_type, scheduled_date)`. Returns the existing
    /// record unchanged if one is already present.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached or written to.
    async fn create_if_absent(
        &self,
        user_id: &UserId,
        message_type: MessageType,
        scheduled_date: NaiveDate,
        scheduled_at: DateTime<Utc>,
        message_body: &str,
    ) -> Result<ScheduledMessage>;

    /// Select up to `limit` records that are due for delivery: status is
    /// `Pending` or `Retry`, `scheduled_at <= now`, and the record is not
    /// currently under an unexpired lease.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached or queried.
    async fn select_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledMessage>>;

    /// All due-candidate records with `scheduled_at` strictly in the past,
    /// regardless of lease state — the startup recovery sweep uses this to
    /// find occurrences that were never delivered because no replica was
    /// running at the time.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached or queried.
    async fn list_missed(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledMessage>>;

    /// Atomically acquire a lease on `id`, succeeding only if the record is
    /// currently unlocked or its prior lease has expired.
    ///
    /// Returns `true` if the lease was acquired, `false` if another replica
    /// already holds a live lease.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached or the record does
    /// not exist.
    async fn acquire_lease(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Mark a leased record as `Sent`, clearing its lease.
    ///
    /// Returns `true` if the update applied (the caller still held the
    /// lease), `false` otherwise.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached.
    async fn mark_sent(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Record a failed delivery attempt, transitioning to `new_status`
    /// (`Retry` or `Failed`, decided by the caller) and clearing the lease.
    ///
    /// Returns `true` if the update applied (the caller still held the
    /// lease), `false` otherwise.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached.
    async fn mark_failure(
        &self,
        id: &ScheduledMessageId,
        lock_id: &str,
        new_status: ScheduledMessageStatus,
        retry_count: u32,
        error_message: &str,
    ) -> Result<bool>;

    /// Best-effort release of a lease without changing status, used when an
    /// unexpected error (not a classified delivery failure) interrupts
    /// processing. Returns `true` if the lease was held and released.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached.
    async fn release_lease(&self, id: &ScheduledMessageId, lock_id: &str) -> Result<bool>;

    /// Re-read a single record by id, bypassing any cache — used by the
    /// processor after acquiring a lease to read the authoritative state.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached.
    async fn find_by_id(&self, id: &ScheduledMessageId) -> Result<Option<ScheduledMessage>>;
}
