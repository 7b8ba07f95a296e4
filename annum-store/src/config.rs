//! Runtime selection of the store backend.

use std::sync::Arc;

use crate::{backends::memory::MemoryStore, store::Store};

/// Configuration for the scheduled-message store backing implementation.
///
/// Mirrors the runtime-selectable-backend shape used elsewhere in this
/// codebase: a tagged enum resolved once at startup into a boxed trait
/// object, so callers depend only on [`Store`].
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// SQLite-backed, durable store (production).
    Sqlite { path: String },
    /// In-memory store (testing/development). Not durable across restarts.
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StoreConfig {
    /// Build the configured backend, running embedded migrations for the
    /// SQLite variant.
    ///
    /// # Errors
    /// Returns an error if the SQLite pool cannot be opened or migrated.
    pub async fn into_store(self) -> crate::Result<Arc<dyn Store>> {
        match self {
            Self::Sqlite { path } => {
                let store = crate::backends::sqlite::SqliteStore::connect(&path).await?;
                Ok(Arc::new(store))
            }
            Self::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}
