//! Durable storage for scheduled recurring-event messages.
//!
//! Exposes the [`Store`] trait plus two backends: a SQLite-backed
//! implementation for production use, and an in-memory implementation for
//! tests and local development.

pub mod backends;
pub mod config;
pub mod error;
pub mod store;

pub use backends::memory::MemoryStore;
pub use backends::sqlite::SqliteStore;
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::Store;
