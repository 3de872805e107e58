use super::BackendFactory;
use crate::framework::{ControllerError, ControllerFactory, HealthRegistry};
use crate::loader::{Loader, LoaderError, RejectReason, DEFAULT_MANIFEST_PATH};
use crate::model::{ExitOutcome, ManagedServiceDefinition, OperationResult, ReadinessPolicy, RunSummary};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};

/// Inputs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub config_root: PathBuf,
    pub environment: String,
    /// Relative paths resolve against `config_root`.
    pub manifest_path: PathBuf,
    /// Used where the manifest does not override readiness settings.
    pub default_readiness: ReadinessPolicy,
}

impl RunConfig {
    pub fn new(config_root: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            config_root: config_root.into(),
            environment: environment.into(),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            default_readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_default_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.default_readiness = policy;
        self
    }
}

/// Applies every managed service of a manifest, one at a time.
///
/// A failing service is recorded and the run moves on to the next one. Only
/// an unreadable or malformed manifest stops the run.
pub struct ConfigManager<F> {
    loader: Loader,
    factory: F,
    health: HealthRegistry,
}

impl<F: ControllerFactory> ConfigManager<F> {
    pub fn new(config: RunConfig, factory: F) -> Self {
        let loader = Loader::new(config.config_root, config.environment)
            .with_manifest_path(config.manifest_path)
            .with_default_readiness(config.default_readiness);
        Self {
            loader,
            factory,
            health: HealthRegistry::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Controllers that passed readiness during the last run, by service name.
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub async fn run(&mut self) -> Result<RunSummary, LoaderError> {
        let manifest = self.loader.read_manifest().await?;
        info!(
            services = manifest.services.len(),
            rejected = manifest.rejected.len(),
            manifest = %self.loader.manifest_location().display(),
            "Manifest loaded"
        );

        let mut summary = RunSummary::default();
        for rejected in &manifest.rejected {
            // Unknown types are skipped without failing the run.
            if let RejectReason::Invalid(_) = rejected.reason {
                summary.record_rejected();
            }
        }

        for service in manifest.services {
            let span = info_span!("service", service = %service.name, kind = %service.kind);
            let result = self.process(service).instrument(span).await;
            summary.record(result);
        }

        for result in &summary.results {
            let duration_ms = result.duration.as_millis() as u64;
            if result.is_success() {
                info!(service = %result.service_name, duration_ms, "Service configured");
            } else {
                error!(service = %result.service_name, duration_ms, outcome = %result.outcome, "Service failed");
            }
        }
        self.log_health().await;
        info!(processed = summary.processed, failed = summary.failed, "Run complete");
        Ok(summary)
    }

    async fn process(&mut self, service: ManagedServiceDefinition) -> OperationResult {
        let started = Instant::now();

        let artifacts = match self.loader.load_artifacts(&service).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                let e = ControllerError::from(e);
                error!(error = %e, "Failed to load artifacts");
                return OperationResult::failure(service.name, e.to_string(), started.elapsed());
            }
        };

        let controller = match self.factory.build(&service, artifacts) {
            Ok(controller) => controller,
            Err(e) => {
                error!(error = %e, "Failed to build controller");
                return OperationResult::failure(service.name, e.to_string(), started.elapsed());
            }
        };

        // Runs on its own task so a panicking controller only fails its service.
        let readiness = service.readiness;
        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                if !controller.wait_until_ready(&readiness).await {
                    return None;
                }
                Some(controller.apply().await)
            }
            .in_current_span()
        });

        // Only controllers that came up are kept for the health snapshot.
        let mut result = match task.await {
            Ok(Some(result)) => {
                self.health.register(service.name.clone(), controller);
                result
            }
            Ok(None) => OperationResult::failure(
                service.name,
                ControllerError::Unavailable.to_string(),
                Duration::ZERO,
            ),
            Err(e) => {
                error!(error = %e, "Controller task failed");
                let reason = if e.is_panic() {
                    "controller panicked"
                } else {
                    "controller task cancelled"
                };
                OperationResult::failure(service.name, reason, Duration::ZERO)
            }
        };
        result.duration = started.elapsed();
        result
    }

    async fn log_health(&self) {
        if self.health.is_empty() {
            return;
        }
        let report = self.health.report(None).await;
        for (name, status) in &report.services {
            info!(service = %name, connected = status.connected, status = %status.status, "Health");
        }
        info!(status = ?report.status, services = report.services.len(), "Health snapshot");
    }
}

/// Runs the manifest under `config_root` against the real backends.
pub async fn run(config_root: impl Into<PathBuf>, environment: &str) -> ExitOutcome {
    run_with(RunConfig::new(config_root, environment)).await
}

pub async fn run_with(config: RunConfig) -> ExitOutcome {
    let factory = BackendFactory::new(config.environment.clone());
    match ConfigManager::new(config, factory).run().await {
        Ok(summary) => summary.exit_outcome(),
        Err(e) => {
            error!(error = %e, "Cannot read manifest");
            ExitOutcome::Failure
        }
    }
}
