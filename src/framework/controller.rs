//! # Backend Controllers
//!
//! A [`Controller`] is bound to one [`ManagedServiceDefinition`] and owns the
//! connection to its backend. The orchestrator only ever talks to controllers
//! through this trait, so the three backend variants and the test mocks are
//! interchangeable.
//!
//! ## Provided Methods
//!
//! Implementors supply [`Controller::probe`] and [`Controller::apply_artifacts`].
//! The retry loop ([`Controller::wait_until_ready`]) and the conversion of
//! errors into an [`OperationResult`] ([`Controller::apply`]) are shared.

use super::{ControllerError, HealthCheck};
use crate::model::{ConfigArtifact, ManagedServiceDefinition, OperationResult, ReadinessPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// What an apply pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Items created or statements executed.
    pub applied: usize,
    /// Items that already existed and were left untouched.
    pub unchanged: usize,
}

impl ApplySummary {
    pub fn new(applied: usize, unchanged: usize) -> Self {
        Self { applied, unchanged }
    }
}

#[async_trait]
pub trait Controller: HealthCheck {
    fn service(&self) -> &ManagedServiceDefinition;

    /// One connectivity check against the backend.
    async fn probe(&self) -> Result<(), ControllerError>;

    /// Brings the backend to the state its artifacts describe.
    async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError>;

    /// Probes up to `policy.max_attempts` times with a fixed delay between
    /// attempts. Returns `true` on the first successful probe.
    async fn wait_until_ready(&self, policy: &ReadinessPolicy) -> bool {
        let name = self.service().name.as_str();
        for attempt in 1..=policy.max_attempts {
            match self.probe().await {
                Ok(()) => {
                    info!(service = %name, attempt, "Backend ready");
                    return true;
                }
                Err(e) => {
                    warn!(
                        service = %name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Backend not ready"
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }
        error!(service = %name, max_attempts = policy.max_attempts, "Backend unavailable");
        false
    }

    /// Applies the artifacts and records the outcome. Never fails.
    async fn apply(&self) -> OperationResult {
        let name = self.service().name.clone();
        let started = Instant::now();
        match self.apply_artifacts().await {
            Ok(summary) => {
                info!(
                    service = %name,
                    applied = summary.applied,
                    unchanged = summary.unchanged,
                    "Configuration applied"
                );
                OperationResult::success(name, started.elapsed())
            }
            Err(e) => {
                error!(service = %name, error = %e, "Apply failed");
                OperationResult::failure(name, e.to_string(), started.elapsed())
            }
        }
    }
}

/// Builds the controller for one service.
///
/// Construction resolves connection settings but must not connect; the live
/// connection is opened on first use.
pub trait ControllerFactory: Send + Sync {
    fn build(
        &self,
        service: &ManagedServiceDefinition,
        artifacts: Vec<ConfigArtifact>,
    ) -> Result<Arc<dyn Controller>, ControllerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BackendKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` probes, then succeeds.
    struct Flaky {
        service: ManagedServiceDefinition,
        failures: u32,
        probes: AtomicU32,
        apply_error: Option<String>,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                service: ManagedServiceDefinition::new("flaky", BackendKind::Relational, "db"),
                failures,
                probes: AtomicU32::new(0),
                apply_error: None,
            }
        }
    }

    impl HealthCheck for Flaky {}

    #[async_trait]
    impl Controller for Flaky {
        fn service(&self) -> &ManagedServiceDefinition {
            &self.service
        }

        async fn probe(&self) -> Result<(), ControllerError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ControllerError::Backend("connection refused".into()))
            } else {
                Ok(())
            }
        }

        async fn apply_artifacts(&self) -> Result<ApplySummary, ControllerError> {
            match &self.apply_error {
                Some(reason) => Err(ControllerError::InvalidArtifact(reason.clone())),
                None => Ok(ApplySummary::new(2, 1)),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_transient_failures() {
        let controller = Flaky::new(2);
        let policy = ReadinessPolicy::new(5, Duration::from_secs(5));

        let started = Instant::now();
        assert!(controller.wait_until_ready(&policy).await);
        assert_eq!(controller.probes.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_do_not_sleep_after_the_last_probe() {
        let controller = Flaky::new(u32::MAX);
        let policy = ReadinessPolicy::new(3, Duration::from_secs(5));

        let started = Instant::now();
        assert!(!controller.wait_until_ready(&policy).await);
        assert_eq!(controller.probes.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn zero_attempts_never_probe() {
        let controller = Flaky::new(0);
        assert!(!controller.wait_until_ready(&ReadinessPolicy::new(0, Duration::ZERO)).await);
        assert_eq!(controller.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn apply_converts_errors_into_failures() {
        let mut controller = Flaky::new(0);
        assert!(controller.apply().await.is_success());

        controller.apply_error = Some("scopes must be a list".to_string());
        let result = controller.apply().await;
        assert_eq!(result.service_name, "flaky");
        assert!(!result.is_success());
        assert!(result.outcome.to_string().contains("scopes must be a list"));
    }
}
