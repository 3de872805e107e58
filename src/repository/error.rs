//! Error types for repositories.

use crate::document_store::DocumentStoreError;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists.
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// A record could not be converted to or from its stored form.
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid keyspace: {0}")]
    InvalidKeyspace(String),

    #[error(transparent)]
    DocumentStore(#[from] DocumentStoreError),

    /// The in-memory store task has stopped.
    #[error("Repository closed")]
    Closed,

    #[error("Repository dropped response channel")]
    Dropped,
}
