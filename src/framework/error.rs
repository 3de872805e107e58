//! # Controller Errors
//!
//! Every failure a controller can report is funnelled into [`ControllerError`]
//! so the orchestrator can turn it into a recorded failure without knowing
//! which backend produced it.

use crate::loader::LoaderError;
use crate::model::TargetError;

/// Errors that can occur while building or running a controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The readiness probe never succeeded.
    #[error("connection unavailable")]
    Unavailable,
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Load(#[from] LoaderError),
    /// A structured artifact parsed but does not describe a valid target state.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
    /// The backend rejected an operation.
    #[error("{0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl ControllerError {
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ControllerError::Backend(Box::new(error))
    }
}
