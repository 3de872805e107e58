use crate::settings::Settings;
use std::path::{Path, PathBuf};

/// A discovered unit of configuration for one managed service.
///
/// Artifacts are read fresh on every run; nothing is cached between runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigArtifact {
    /// A parsed `couchbase.yaml` / `redpanda.yaml` document.
    StructuredConfig(Settings),
    /// An SQL script, located but not read by the loader.
    Script(PathBuf),
}

impl ConfigArtifact {
    pub fn as_structured(&self) -> Option<&Settings> {
        match self {
            ConfigArtifact::StructuredConfig(content) => Some(content),
            ConfigArtifact::Script(_) => None,
        }
    }

    pub fn as_script(&self) -> Option<&Path> {
        match self {
            ConfigArtifact::Script(path) => Some(path),
            ConfigArtifact::StructuredConfig(_) => None,
        }
    }
}
