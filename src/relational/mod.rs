//! Relational (PostgreSQL) controller.

pub mod controller;
pub mod error;
pub mod split;

pub use controller::RelationalController;
pub use error::*;
pub use split::split_statements;

use crate::clients::PostgresClient;
use crate::model::{ConfigArtifact, ConnectionTarget, ManagedServiceDefinition};

/// Creates a controller backed by a PostgreSQL client.
pub fn new(
    service: ManagedServiceDefinition,
    artifacts: Vec<ConfigArtifact>,
    target: &ConnectionTarget,
) -> Result<RelationalController<PostgresClient>, RelationalError> {
    let client = PostgresClient::new(target)?;
    Ok(RelationalController::new(service, client, artifacts))
}
