//! Error types shared across crate boundaries.

use thiserror::Error;

/// Errors surfaced by the shared types and by collaborators the core only
/// reads through (the user directory).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("user directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("invalid data: {0}")]
    Invalid(String),
}
