//! # Generic Repository
//!
//! CRUD access to records of one type, parameterised over the record type and
//! configured explicitly at construction (a keyspace plus a backend handle).
//!
//! ## Key Types
//!
//! - [`Record`]: marker for types that can be stored.
//! - [`Stored`]: a record together with its id.
//! - [`Repository`]: the async access trait. Batch operations have default
//!   implementations on top of the single-record ones.
//! - [`BatchOutcome`]: which keys of a batch succeeded and which failed.
//!
//! Two implementations ship with the crate: [`MemoryRepository`], a
//! single-task actor owning a map, and [`DocumentRepository`] over the
//! document store's query service.

pub mod document;
pub mod error;
pub mod memory;

pub use document::{DocumentRepository, Keyspace};
pub use error::RepositoryError;
pub use memory::{MemoryRepository, MemoryStore};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Marker for types a [`Repository`] can hold.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A record and the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    pub data: T,
}

/// Result of a batch operation. Every requested key ends up in exactly one
/// of the two lists, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    /// Failed keys with the reason.
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Stored<T>>, RepositoryError>;

    /// Stores `data` under `id`. Fails if the key is taken.
    async fn insert(&self, id: String, data: T) -> Result<Stored<T>, RepositoryError>;

    /// Replaces an existing record. Fails with `NotFound` if it is absent.
    async fn update(&self, item: Stored<T>) -> Result<Stored<T>, RepositoryError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    async fn list(&self, limit: Option<usize>) -> Result<Vec<Stored<T>>, RepositoryError>;

    /// Stores `data` under a fresh random key.
    async fn create(&self, data: T) -> Result<Stored<T>, RepositoryError> {
        self.insert(uuid::Uuid::new_v4().to_string(), data).await
    }

    /// Fetches the records that exist; missing keys are skipped.
    #[tracing::instrument(skip(self))]
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Stored<T>>, RepositoryError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.get(id).await? {
                found.push(item);
            }
        }
        debug!(requested = ids.len(), found = found.len(), "Fetched records");
        Ok(found)
    }

    /// Stops at the first failure; records created before it are kept.
    async fn create_many(&self, items: Vec<T>) -> Result<Vec<Stored<T>>, RepositoryError> {
        let mut created = Vec::with_capacity(items.len());
        for data in items {
            created.push(self.create(data).await?);
        }
        Ok(created)
    }

    /// Stops at the first failure; records updated before it stay updated.
    async fn update_many(&self, items: Vec<Stored<T>>) -> Result<Vec<Stored<T>>, RepositoryError> {
        let mut updated = Vec::with_capacity(items.len());
        for item in items {
            updated.push(self.update(item).await?);
        }
        Ok(updated)
    }

    /// Attempts every key and reports each one.
    #[tracing::instrument(skip(self))]
    async fn delete_many(&self, ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match self.delete(id).await {
                Ok(true) => outcome.succeeded.push(id.clone()),
                Ok(false) => outcome.failed.push((id.clone(), "not found".to_string())),
                Err(e) => {
                    warn!(%id, error = %e, "Delete failed");
                    outcome.failed.push((id.clone(), e.to_string()));
                }
            }
        }
        outcome
    }
}
