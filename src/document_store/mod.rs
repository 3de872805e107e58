//! Document store (Couchbase) controller.

pub mod controller;
pub mod error;
pub mod scopes;

pub use controller::DocumentStoreController;
pub use error::*;
pub use scopes::{declared_scopes, CollectionSpec, ScopeSpec};

use crate::clients::CouchbaseClient;
use crate::model::{ConfigArtifact, ConnectionTarget, ManagedServiceDefinition};

/// Creates a controller backed by a Couchbase REST client.
pub fn new(
    service: ManagedServiceDefinition,
    artifacts: Vec<ConfigArtifact>,
    environment: &str,
    target: &ConnectionTarget,
) -> Result<DocumentStoreController<CouchbaseClient>, DocumentStoreError> {
    let client = CouchbaseClient::new(target)?;
    Ok(DocumentStoreController::new(service, client, artifacts, environment))
}
