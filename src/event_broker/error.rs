//! Error types for the event broker controller.

use crate::framework::ControllerError;
use crate::model::TargetError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while managing broker topics.
#[derive(Debug, Error)]
pub enum EventBrokerError {
    /// The structured config does not describe a valid set of topics.
    #[error("invalid redpanda config: {0}")]
    InvalidConfig(String),

    /// The configured security protocol is not supported.
    #[error("unsupported security protocol: {0}")]
    UnsupportedProtocol(String),

    #[error(transparent)]
    Target(#[from] TargetError),

    /// The broker did not answer in time.
    #[error("broker request timed out after {0:?}")]
    Timeout(Duration),

    /// The broker or the client library reported an error.
    #[error("broker error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),
}

impl From<EventBrokerError> for ControllerError {
    fn from(e: EventBrokerError) -> Self {
        match e {
            EventBrokerError::InvalidConfig(reason) => ControllerError::InvalidArtifact(reason),
            EventBrokerError::Target(e) => ControllerError::Target(e),
            other => ControllerError::backend(other),
        }
    }
}
