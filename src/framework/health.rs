//! # Health Registry
//!
//! Long-lived clients may expose a capability check. Instead of discovering
//! them by name, they are registered explicitly under the service name they
//! belong to. A handle that offers no check is healthy by convention.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::error;

/// Result of one capability check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub connected: bool,
    pub status: String,
    #[serde(flatten)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            connected: true,
            status: "ok".to_string(),
            detail: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut detail = BTreeMap::new();
        detail.insert("error".to_string(), serde_json::Value::String(message.into()));
        Self {
            connected: false,
            status: "error".to_string(),
            detail,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

/// A handle that can report its own health.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Returns `None` when the handle offers no check.
    async fn health_check(&self) -> Option<HealthStatus> {
        None
    }
}

/// Aggregate state across all checked handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: OverallHealth,
    pub services: BTreeMap<String, HealthStatus>,
}

/// Explicit mapping from service name to a health-checkable handle.
#[derive(Clone)]
pub struct HealthRegistry {
    entries: BTreeMap<String, Arc<dyn HealthCheck>>,
    check_timeout: Duration,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            check_timeout: Self::DEFAULT_CHECK_TIMEOUT,
        }
    }
}

impl HealthRegistry {
    pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each individual check; a slower handle is reported as an error.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Registers `handle` under `name`, replacing any previous handle.
    pub fn register(&mut self, name: impl Into<String>, handle: Arc<dyn HealthCheck>) {
        self.entries.insert(name.into(), handle);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every registered handle, or only those named in `filter`
    /// (compared case-insensitively). Checks run concurrently.
    pub async fn report(&self, filter: Option<&[&str]>) -> HealthReport {
        let wanted = |name: &str| {
            filter.map_or(true, |names| names.iter().any(|n| n.trim().eq_ignore_ascii_case(name)))
        };

        let limit = self.check_timeout;
        let mut checks = JoinSet::new();
        for (name, handle) in self.entries.iter().filter(|(name, _)| wanted(name)) {
            let (name, handle) = (name.clone(), handle.clone());
            checks.spawn(async move {
                let result = match tokio::time::timeout(limit, handle.health_check()).await {
                    Ok(status) => status.unwrap_or_else(HealthStatus::ok),
                    Err(_) => HealthStatus::error(format!("health check timed out after {limit:?}")),
                };
                (name, result)
            });
        }

        let mut status = OverallHealth::Healthy;
        let mut services = BTreeMap::new();
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    if !result.connected {
                        status = OverallHealth::Degraded;
                    }
                    services.insert(name, result);
                }
                Err(e) => {
                    error!(error = %e, "Health check task failed");
                    status = OverallHealth::Degraded;
                }
            }
        }
        HealthReport { status, services }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl HealthCheck for Silent {}

    struct Fixed(HealthStatus);

    #[async_trait]
    impl HealthCheck for Fixed {
        async fn health_check(&self) -> Option<HealthStatus> {
            Some(self.0.clone())
        }
    }

    #[tokio::test]
    async fn handles_without_a_check_are_healthy() {
        let mut registry = HealthRegistry::new();
        registry.register("cache", Arc::new(Silent));

        let report = registry.report(None).await;
        assert_eq!(report.status, OverallHealth::Healthy);
        assert_eq!(report.services["cache"], HealthStatus::ok());
    }

    #[tokio::test]
    async fn a_disconnected_handle_degrades_the_report() {
        let mut registry = HealthRegistry::new();
        registry.register("kv", Arc::new(Fixed(HealthStatus::ok().with_detail("bucket", "main"))));
        registry.register("db", Arc::new(Fixed(HealthStatus::error("refused"))));

        let report = registry.report(None).await;
        assert_eq!(report.status, OverallHealth::Degraded);
        assert_eq!(report.services.len(), 2);
        assert_eq!(report.services["kv"].detail["bucket"], "main");
    }

    #[tokio::test]
    async fn filter_limits_the_checked_handles() {
        let mut registry = HealthRegistry::new();
        registry.register("kv", Arc::new(Silent));
        registry.register("db", Arc::new(Fixed(HealthStatus::error("refused"))));

        let report = registry.report(Some(&["KV"])).await;
        assert_eq!(report.status, OverallHealth::Healthy);
        assert_eq!(report.services.keys().collect::<Vec<_>>(), ["kv"]);
    }

    struct Stalled;

    #[async_trait]
    impl HealthCheck for Stalled {
        async fn health_check(&self) -> Option<HealthStatus> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Some(HealthStatus::ok())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_stalled_check_times_out_on_its_own() {
        let mut registry = HealthRegistry::new().with_check_timeout(Duration::from_secs(2));
        registry.register("db", Arc::new(Stalled));
        registry.register("bus", Arc::new(Stalled));
        registry.register("kv", Arc::new(Fixed(HealthStatus::ok())));

        let started = tokio::time::Instant::now();
        let report = registry.report(None).await;

        // Both stalled checks share the same window instead of queueing.
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
        assert_eq!(report.status, OverallHealth::Degraded);
        assert_eq!(report.services.len(), 3);
        assert!(report.services["kv"].connected);
        assert!(!report.services["db"].connected);
        assert!(report.services["bus"].detail["error"]
            .as_str()
            .unwrap()
            .starts_with("health check timed out"));
    }

    #[test]
    fn status_serializes_flat() {
        let json = serde_json::to_value(HealthStatus::error("boom")).unwrap();
        assert_eq!(json["connected"], false);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
    }
}
