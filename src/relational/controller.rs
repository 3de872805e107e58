use super::{split_statements, RelationalError};
use crate::clients::SqlExecutor;
use crate::framework::{ApplySummary, Controller, ControllerError, HealthCheck, HealthStatus};
use crate::model::{ConfigArtifact, ManagedServiceDefinition};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Runs a service's SQL scripts in order, one auto-committed statement at a
/// time.
///
/// The first failing statement stops the run: statements before it stay
/// committed, later statements and scripts are not executed.
pub struct RelationalController<E> {
    service: ManagedServiceDefinition,
    executor: E,
    scripts: Vec<PathBuf>,
}

impl<E: SqlExecutor> RelationalController<E> {
    /// Keeps the script artifacts in the order given.
    pub fn new(service: ManagedServiceDefinition, executor: E, artifacts: Vec<ConfigArtifact>) -> Self {
        let scripts = artifacts
            .into_iter()
            .filter_map(|artifact| match artifact {
                ConfigArtifact::Script(path) => Some(path),
                ConfigArtifact::StructuredConfig(_) => None,
            })
            .collect();
        Self {
            service,
            executor,
            scripts,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn run_script(&self, path: &Path) -> Result<usize, RelationalError> {
        let script = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!(script = %script, "Executing SQL script");

        let sql = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RelationalError::ReadScript {
                path: path.to_path_buf(),
                source,
            })?;
        let statements = split_statements(&sql);
        if statements.is_empty() {
            warn!(script = %script, "Script has no statements");
            return Ok(0);
        }

        for (index, statement) in statements.iter().enumerate() {
            self.executor
                .execute(statement)
                .await
                .map_err(|source| RelationalError::Statement {
                    script: script.clone(),
                    index: index + 1,
                    source: Box::new(source),
                })?;
        }
        info!(script = %script, statements = statements.len(), "SQL script executed");
        Ok(statements.len())
    }
}

#[async_trait]
impl<E: SqlExecutor> HealthCheck for RelationalController<E> {
    async fn health_check(&self) -> Option<HealthStatus> {
        self.executor.health_check().await
    }
}

#[async_trait]
impl<E: SqlExecutor> Controller for RelationalController<E> {
    fn service(&self) -> &ManagedServiceDefinition {
        &self.service
    }

    async fn probe(&self) -> Result<(), ControllerError> {
        Ok(self.executor.ping().await?)
    }

    #[instrument(skip(self), fields(service = %self.service.name))]
    async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError> {
        if self.scripts.is_empty() {
            warn!("No SQL scripts found");
            return Ok(ApplySummary::default());
        }
        let mut summary = ApplySummary::default();
        for path in &self.scripts {
            summary.applied += self.run_script(path).await?;
        }
        Ok(summary)
    }
}
