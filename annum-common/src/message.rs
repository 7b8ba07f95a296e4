//! The `ScheduledMessage` record and its identity/status types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Identifier for a scheduled message.
///
/// A ULID: lexicographically sortable by creation time, collision-resistant
/// without a central sequence, and round-trips cleanly through both the SQL
/// backend (stored as text) and the in-memory test backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduledMessageId(ulid::Ulid);

impl ScheduledMessageId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub const fn from_ulid(id: ulid::Ulid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl std::fmt::Display for ScheduledMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ScheduledMessageId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(Self)
    }
}

impl Serialize for ScheduledMessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ScheduledMessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Extensible event-type tag. New variants are added here as new recurring
/// event types are onboarded (spec §1: "extensible to anniversaries and
/// other annual events").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Birthday,
    Anniversary,
}

impl MessageType {
    /// The noun used when rendering the message body, e.g. "birthday".
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.noun())
    }
}

/// Lifecycle status of a [`ScheduledMessage`] (spec §3, invariant 2:
/// terminality once `Sent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledMessageStatus {
    Pending,
    Retry,
    Sent,
    Failed,
}

impl ScheduledMessageStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    #[must_use]
    pub const fn is_due_candidate(self) -> bool {
        matches!(self, Self::Pending | Self::Retry)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retry => "retry",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ScheduledMessageStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "retry" => Ok(Self::Retry),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(crate::CoreError::Invalid(format!(
                "unknown scheduled message status: {other}"
            ))),
        }
    }
}

/// A durable record of one event occurrence to be delivered (spec §3).
///
/// Invariants (enforced by the store, not by this struct in isolation):
/// at most one record per `(user_id, message_type, scheduled_date)`;
/// `Sent` records are immutable; a lease is valid iff `lock_id.is_some()`
/// and `locked_until > now`; `retry_count <= max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: ScheduledMessageId,
    pub user_id: UserId,
    pub message_type: MessageType,
    pub message_body: String,
    pub status: ScheduledMessageStatus,
    /// The identity component for dedup — always the caller-supplied civil
    /// date string, never derived back out of `scheduled_at` (spec §4.B:
    /// this must survive timezone/DST quirks).
    pub scheduled_date: NaiveDate,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub lock_id: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledMessage {
    /// Whether this record's lease is currently held by someone (spec §3,
    /// invariant 3: an expired lease is equivalent to unlocked).
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!((self.lock_id.as_ref(), self.locked_until), (Some(_), Some(until)) if until > now)
    }
}
