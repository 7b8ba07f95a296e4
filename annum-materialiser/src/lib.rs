//! Turns each active user's civil event anchor into a durable, deduplicated
//! [`annum_store`] record for today's occurrence, if today is an event day
//! in that user's zone.

pub mod config;
pub mod error;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use annum_common::{MessageType, User, UserDirectory};
use annum_store::Store;

pub use config::MaterialiserConfig;
pub use error::{MaterialiserError, Result};

/// Materialises today's occurrence for every active user, for a single
/// `message_type`.
///
/// Per-user failures (an unparsable timezone, a store write error) are
/// logged and skipped rather than aborting the whole batch — one bad user
/// record must not block every other user's delivery.
///
/// Returns the number of records created or confirmed present.
pub async fn materialise_today(
    directory: &Arc<dyn UserDirectory>,
    store: &Arc<dyn Store>,
    config: &MaterialiserConfig,
    message_type: MessageType,
    now: DateTime<Utc>,
) -> Result<usize> {
    let users = directory.list_active().await?;
    let mut materialised = 0;

    for user in users {
        match materialise_one(store, config, message_type, now, &user).await {
            Ok(true) => materialised += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(
                    user = %user.id,
                    error = %err,
                    "failed to materialise occurrence for user, skipping"
                );
            }
        }
    }

    Ok(materialised)
}

/// Materialise today's occurrence for a single user, if today is their
/// event day. Returns `Ok(true)` if a record was created or already
/// present, `Ok(false)` if today is not an event day for this user (not an
/// error).
async fn materialise_one(
    store: &Arc<dyn Store>,
    config: &MaterialiserConfig,
    message_type: MessageType,
    now: DateTime<Utc>,
    user: &User,
) -> Result<bool> {
    let tz = chrono_tz::Tz::from_str(&user.timezone).map_err(|_| {
        MaterialiserError::InvalidTimezone {
            user: user.id.clone(),
            zone: user.timezone.clone(),
        }
    })?;

    let today_local = now.with_timezone(&tz).date_naive();

    let Some(occurrence_date) =
        annum_common::time::civil_occurrence_date(user.anchor, today_local.year())
    else {
        return Ok(false);
    };

    if occurrence_date != today_local {
        return Ok(false);
    }

    let scheduled_at = annum_common::time::resolve_wall_clock(
        occurrence_date,
        config.message_hour,
        config.message_minute,
        tz,
    );

    let body = format!("Hey, {} it's your {}", user.full_name(), message_type.noun());

    store
        .create_if_absent(&user.id, message_type, occurrence_date, scheduled_at, &body)
        .await?;

    Ok(true)
}
