//! HTTP client for the external user directory.
//!
//! The directory's own CRUD surface, HTTP handlers, and input validation
//! are an external collaborator; this is only the read-only consumer side
//! the scheduling core needs (`listActive`, `findById`).

use annum_common::{CoreError, User, UserDirectory, UserId};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    anchor: chrono::NaiveDate,
    timezone: String,
    active: bool,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: UserId::new(record.id),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            anchor: record.anchor,
            timezone: record.timezone,
            active: record.active,
        }
    }
}

#[derive(Debug)]
pub struct HttpUserDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url,
        })
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn list_active(&self) -> Result<Vec<User>, CoreError> {
        let url = format!("{}/users?active=true", self.base_url);
        let records: Vec<UserRecord> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?;

        Ok(records.into_iter().map(User::from).collect())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
        let url = format!("{}/users/{}", self.base_url, id.as_str());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record: UserRecord = response
            .error_for_status()
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| CoreError::DirectoryUnavailable(e.to_string()))?;

        Ok(Some(record.into()))
    }
}
