//! The read-only user directory contract.
//!
//! The core never writes users; the CRUD surface and its HTTP handlers are
//! an external collaborator (see spec §1). This module defines only what
//! the core needs to *read*.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A user identifier, as handed to us by the external user directory.
///
/// Wrapped in a newtype (rather than passed around as a bare `String`) so a
/// user id can never be accidentally substituted for a message id or an
/// email address at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct UserId(Arc<str>);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A user as read from the external directory.
///
/// Only the fields the scheduling/delivery core actually consumes are
/// represented here; the directory's own schema may carry more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Civil `YYYY-MM-DD` anchor date for the recurring event. Only the
    /// month and day are used for recurrence; the year is informational.
    ///
    /// Validation of this string against civil calendar rules is the user
    /// directory's responsibility, not the core's (spec §9, Open Questions).
    pub anchor: NaiveDate,
    /// IANA timezone identifier, e.g. `"America/New_York"`.
    pub timezone: String,
    pub active: bool,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Read-only access to the external user directory.
///
/// The HTTP handlers and storage backing this trait are out of scope for
/// the core (spec §1); implementations live in the surrounding application.
#[async_trait]
pub trait UserDirectory: Send + Sync + fmt::Debug {
    /// List all users with `active = true`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be reached or queried.
    async fn list_active(&self) -> Result<Vec<User>, crate::CoreError>;

    /// Look up a single user by id.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be reached or queried.
    /// A user that does not exist is `Ok(None)`, not an error.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, crate::CoreError>;
}
