//! Error types for the document store controller and repository.

use crate::framework::ControllerError;
use crate::model::TargetError;
use thiserror::Error;

/// Errors that can occur while talking to Couchbase.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The structured config does not describe a valid set of scopes.
    #[error("invalid couchbase config: {0}")]
    InvalidConfig(String),

    /// The connection protocol is not one of couchbase, couchbases, http or https.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error(transparent)]
    Target(#[from] TargetError),

    /// The request never got a response.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{operation} returned {status}: {body}")]
    Rejected {
        operation: String,
        status: u16,
        body: String,
    },

    /// The query service reported errors.
    #[error("query failed: {0}")]
    Query(String),

    /// A response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<DocumentStoreError> for ControllerError {
    fn from(e: DocumentStoreError) -> Self {
        match e {
            DocumentStoreError::InvalidConfig(reason) => ControllerError::InvalidArtifact(reason),
            DocumentStoreError::Target(e) => ControllerError::Target(e),
            other => ControllerError::backend(other),
        }
    }
}
