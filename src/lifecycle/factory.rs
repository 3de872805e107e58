use crate::document_store;
use crate::event_broker;
use crate::framework::{Controller, ControllerError, ControllerFactory};
use crate::model::{BackendKind, ConfigArtifact, ConnectionTarget, ManagedServiceDefinition};
use crate::relational;
use std::sync::Arc;
use tracing::debug;

/// Builds the real controller for a service's backend kind, resolving its
/// connection target from the process environment.
#[derive(Debug, Clone)]
pub struct BackendFactory {
    environment: String,
}

impl BackendFactory {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }
}

impl ControllerFactory for BackendFactory {
    fn build(
        &self,
        service: &ManagedServiceDefinition,
        artifacts: Vec<ConfigArtifact>,
    ) -> Result<Arc<dyn Controller>, ControllerError> {
        let target = ConnectionTarget::from_env(service.kind, &service.env_prefix())?;
        debug!(service = %service.name, ?target, "Resolved connection target");

        let service = service.clone();
        Ok(match service.kind {
            BackendKind::DocumentStore => {
                Arc::new(document_store::new(service, artifacts, &self.environment, &target)?)
            }
            BackendKind::EventBroker => {
                Arc::new(event_broker::new(service, artifacts, &self.environment, &target)?)
            }
            BackendKind::Relational => Arc::new(relational::new(service, artifacts, &target)?),
        })
    }
}
