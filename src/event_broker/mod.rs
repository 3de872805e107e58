//! Event broker (Redpanda) controller.

pub mod controller;
pub mod error;
pub mod topics;

pub use controller::EventBrokerController;
pub use error::*;
pub use topics::{declared_topics, TopicSpec};

use crate::clients::RedpandaClient;
use crate::model::{ConfigArtifact, ConnectionTarget, ManagedServiceDefinition};

/// Creates a controller backed by a Redpanda admin client.
pub fn new(
    service: ManagedServiceDefinition,
    artifacts: Vec<ConfigArtifact>,
    environment: &str,
    target: &ConnectionTarget,
) -> Result<EventBrokerController<RedpandaClient>, EventBrokerError> {
    let client = RedpandaClient::new(target)?;
    Ok(EventBrokerController::new(service, client, artifacts, environment))
}
