//! Shared types for the annum recurring-event delivery engine.
//!
//! This crate holds the types every other `annum-*` crate depends on: the
//! read-only [`User`] contract, the [`ScheduledMessage`] record and its
//! identity/status types, civil-time arithmetic, and the error variants
//! that cross crate boundaries.

pub mod error;
pub mod message;
pub mod time;
pub mod user;

pub use error::CoreError;
pub use message::{MessageType, ScheduledMessage, ScheduledMessageId, ScheduledMessageStatus};
pub use tracing;
pub use user::{User, UserDirectory, UserId};

/// Broadcast across every running component to drain in-flight ticks before
/// the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
