//! Error types for the annum-store crate.

use annum_common::ScheduledMessageId;
use thiserror::Error;

/// Top-level store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("record not found: {0}")]
    NotFound(ScheduledMessageId),

    #[error("lease not held for record: {0}")]
    LeaseNotHeld(ScheduledMessageId),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
