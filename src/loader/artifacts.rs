//! Artifact discovery by file convention.

use super::LoaderError;
use crate::model::{BackendKind, ConfigArtifact, ManagedServiceDefinition};
use crate::settings::Settings;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Accepted extensions for structured config files, in priority order.
const STRUCTURED_EXTENSIONS: [&str; 2] = ["yaml", "yml"];
const SCRIPT_EXTENSION: &str = "sql";

/// Discovers and loads the artifacts of `service` under `config_root`.
pub async fn load_artifacts(
    config_root: &Path,
    service: &ManagedServiceDefinition,
) -> Result<Vec<ConfigArtifact>, LoaderError> {
    let dir = config_root.join(&service.config_dir);
    match tokio::fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            warn!(service = %service.name, dir = %dir.display(), "Config path is not a directory");
            return Ok(Vec::new());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(service = %service.name, dir = %dir.display(), "Config directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(LoaderError::io(dir, e)),
    }

    match service.kind {
        BackendKind::DocumentStore | BackendKind::EventBroker => {
            match find_structured_config(&dir, service.kind.manifest_name()).await? {
                Some(path) => {
                    info!(service = %service.name, path = %path.display(), "Found config file");
                    let content = read_structured_config(&path).await?;
                    Ok(vec![ConfigArtifact::StructuredConfig(content)])
                }
                None => {
                    info!(service = %service.name, dir = %dir.display(), "No structured config found");
                    Ok(Vec::new())
                }
            }
        }
        BackendKind::Relational => {
            let scripts = find_scripts(&dir).await?;
            info!(service = %service.name, count = scripts.len(), "Found SQL scripts");
            Ok(scripts.into_iter().map(ConfigArtifact::Script).collect())
        }
    }
}

async fn find_structured_config(dir: &Path, stem: &str) -> Result<Option<PathBuf>, LoaderError> {
    for ext in STRUCTURED_EXTENSIONS {
        let path = dir.join(format!("{stem}.{ext}"));
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => return Ok(Some(path)),
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(LoaderError::io(path, e)),
        }
    }
    Ok(None)
}

async fn read_structured_config(path: &Path) -> Result<Settings, LoaderError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoaderError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Settings::new());
    }
    let parsed: Option<Settings> =
        serde_yaml::from_str(&content).map_err(|source| LoaderError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parsed.unwrap_or_default())
}

/// Lists `*.sql` files directly under `dir`, sorted by file name.
async fn find_scripts(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LoaderError::io(dir, e))?;
    let mut scripts = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| LoaderError::io(dir, e))? {
        let path = entry.path();
        let is_script = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));
        if !is_script {
            continue;
        }
        let file_type = entry.file_type().await.map_err(|e| LoaderError::io(&path, e))?;
        if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            scripts.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-file entry");
        }
    }
    scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(scripts)
}
