//! Manifest and artifact loading.
//!
//! The loader turns external state (the manifest file and each service's
//! config directory) into [`ManagedServiceDefinition`]s and
//! [`ConfigArtifact`]s. It is re-run from scratch on every invocation.

pub mod artifacts;
pub mod error;
pub mod manifest;

pub use artifacts::load_artifacts;
pub use error::LoaderError;
pub use manifest::{read_manifest, Manifest, RejectReason, RejectedEntry, DEFAULT_MANIFEST_PATH};

use crate::model::{ConfigArtifact, ManagedServiceDefinition, ReadinessPolicy};
use std::path::{Path, PathBuf};

/// Loads the manifest at its default location under `config_root`, returning
/// only the loadable entries.
pub async fn load_manifest(config_root: &Path) -> Result<Vec<ManagedServiceDefinition>, LoaderError> {
    let manifest = read_manifest(
        &config_root.join(DEFAULT_MANIFEST_PATH),
        "",
        ReadinessPolicy::default(),
    )
    .await?;
    Ok(manifest.services)
}

/// Loader bound to one config root and environment.
#[derive(Debug, Clone)]
pub struct Loader {
    config_root: PathBuf,
    manifest_path: PathBuf,
    environment: String,
    default_readiness: ReadinessPolicy,
}

impl Loader {
    pub fn new(config_root: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            config_root: config_root.into(),
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            environment: environment.into(),
            default_readiness: ReadinessPolicy::default(),
        }
    }

    /// Overrides the manifest location. Relative paths resolve against the config root.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Readiness policy used where the manifest does not override it.
    pub fn with_default_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.default_readiness = policy;
        self
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    pub fn manifest_location(&self) -> PathBuf {
        self.config_root.join(&self.manifest_path)
    }

    pub async fn read_manifest(&self) -> Result<Manifest, LoaderError> {
        read_manifest(&self.manifest_location(), &self.environment, self.default_readiness).await
    }

    pub async fn load_artifacts(
        &self,
        service: &ManagedServiceDefinition,
    ) -> Result<Vec<ConfigArtifact>, LoaderError> {
        load_artifacts(&self.config_root, service).await
    }
}
