//! Error types for the relational controller.

use crate::framework::ControllerError;
use crate::model::TargetError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running SQL scripts.
#[derive(Debug, Error)]
pub enum RelationalError {
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The database could not be reached.
    #[error("connection failed: {0}")]
    Connect(#[source] tokio_postgres::Error),

    /// The server rejected a statement.
    #[error("{0}")]
    Rejected(String),

    /// The driver failed without a server-side error.
    #[error("driver error: {0}")]
    Driver(#[source] tokio_postgres::Error),

    #[error("failed to read {}: {source}", path.display())]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A statement of a script failed. `index` is 1-based.
    #[error("{script}: statement {index} failed: {source}")]
    Statement {
        script: String,
        index: usize,
        #[source]
        source: Box<RelationalError>,
    },
}

impl RelationalError {
    /// Keeps the server's own error message when there is one.
    pub fn from_driver(e: tokio_postgres::Error) -> Self {
        match e.as_db_error() {
            Some(db) => RelationalError::Rejected(format!(
                "{} {}: {}",
                db.severity(),
                db.code().code(),
                db.message()
            )),
            None => RelationalError::Driver(e),
        }
    }
}

impl From<RelationalError> for ControllerError {
    fn from(e: RelationalError) -> Self {
        match e {
            RelationalError::Target(e) => ControllerError::Target(e),
            other => ControllerError::backend(other),
        }
    }
}
