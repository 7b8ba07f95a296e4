use annum_common::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterialiserError {
    #[error("user directory unavailable: {0}")]
    Directory(#[from] annum_common::CoreError),

    #[error("store unavailable: {0}")]
    Store(#[from] annum_store::StoreError),

    #[error("unknown or unparsable timezone {zone:?} for user {user}")]
    InvalidTimezone { user: UserId, zone: String },
}

pub type Result<T> = std::result::Result<T, MaterialiserError>;
