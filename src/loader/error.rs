//! Error types for manifest and artifact loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading the manifest or a service's artifacts.
///
/// Missing files are not errors: a missing manifest is an empty run and a
/// missing config directory is a service with no artifacts.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A file or directory exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML or has the wrong shape.
    #[error("malformed manifest {}: {source}", path.display())]
    MalformedManifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A structured config file is not a valid key-value document.
    #[error("malformed config {}: {source}", path.display())]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}
