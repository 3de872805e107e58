use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// The category of backend a managed service configures.
///
/// The kind decides which controller applies the service and which file
/// convention the loader uses to discover its artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Couchbase: scopes, collections and indexes.
    DocumentStore,
    /// Redpanda (Kafka protocol): topics.
    EventBroker,
    /// PostgreSQL: SQL scripts.
    Relational,
}

impl BackendKind {
    /// The manifest `type` value, which is also the stem of the structured
    /// config file for this kind (`couchbase.yaml`, `redpanda.yaml`).
    pub const fn manifest_name(self) -> &'static str {
        match self {
            BackendKind::DocumentStore => "couchbase",
            BackendKind::EventBroker => "redpanda",
            BackendKind::Relational => "postgres",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_name())
    }
}

/// Returned when a manifest `type` names no known backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for BackendKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "couchbase" => Ok(BackendKind::DocumentStore),
            "redpanda" => Ok(BackendKind::EventBroker),
            "postgres" => Ok(BackendKind::Relational),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Fixed-interval retry policy for readiness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReadinessPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Upper bound on the time spent sleeping between probes.
    pub fn worst_case_wait(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// One entry of the managed-services manifest.
///
/// Built once per run by the loader and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedServiceDefinition {
    pub name: String,
    pub kind: BackendKind,
    /// Relative to the config root.
    pub config_dir: PathBuf,
    pub readiness: ReadinessPolicy,
}

impl ManagedServiceDefinition {
    pub fn new(name: impl Into<String>, kind: BackendKind, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind,
            config_dir: config_dir.into(),
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Prefix of this service's connection variables, e.g. `kv-store` -> `KV_STORE`.
    pub fn env_prefix(&self) -> String {
        env_namespace(&self.name)
    }
}

/// Upper-cases `name` and collapses every run of non-alphanumeric characters
/// into a single `_`.
pub fn env_namespace(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c.to_ascii_uppercase());
        } else {
            pending_sep = true;
        }
    }
    if pending_sep {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_types() {
        assert_eq!("couchbase".parse::<BackendKind>(), Ok(BackendKind::DocumentStore));
        assert_eq!("Redpanda".parse::<BackendKind>(), Ok(BackendKind::EventBroker));
        assert_eq!(" postgres ".parse::<BackendKind>(), Ok(BackendKind::Relational));
        assert_eq!(
            "mongodb".parse::<BackendKind>(),
            Err(UnknownKind("mongodb".to_string()))
        );
    }

    #[test]
    fn namespaces_service_names() {
        assert_eq!(env_namespace("kv-store"), "KV_STORE");
        assert_eq!(env_namespace("couchbase-server"), "COUCHBASE_SERVER");
        assert_eq!(env_namespace("orders.db--main"), "ORDERS_DB_MAIN");
        assert_eq!(env_namespace("pg1"), "PG1");
    }

    #[test]
    fn worst_case_wait_excludes_trailing_sleep() {
        let policy = ReadinessPolicy::new(10, Duration::from_secs(5));
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(45));
        assert_eq!(ReadinessPolicy::new(0, Duration::from_secs(5)).worst_case_wait(), Duration::ZERO);
    }
}
