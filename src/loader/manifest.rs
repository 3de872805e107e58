//! Reading `managed-services.yaml`.

use super::LoaderError;
use crate::model::{BackendKind, ManagedServiceDefinition, ReadinessPolicy};
use crate::settings::{merge, settings_from_value, settings_into, Settings};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Manifest location relative to the config root.
pub const DEFAULT_MANIFEST_PATH: &str = "service-config-manager/managed-services.yaml";

/// Either a bare list of records or a mapping with `services` and `defaults`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    List(Vec<Value>),
    Mapping(ManifestMapping),
}

/// `services` is required and no other top-level key is accepted.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestMapping {
    #[serde(default)]
    defaults: Option<Value>,
    services: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    config_dir: String,
    #[serde(default)]
    settings: Option<Value>,
    #[serde(default)]
    environments: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadinessOverrides {
    max_attempts: Option<u32>,
    retry_delay_secs: Option<f64>,
}

/// Why a manifest entry did not become a [`ManagedServiceDefinition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The `type` names no known backend. The entry is skipped.
    UnknownKind(String),
    /// The record is missing fields or carries unusable settings.
    Invalid(String),
}

/// A manifest entry that was not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Zero-based position in the manifest.
    pub index: usize,
    pub name: Option<String>,
    pub reason: RejectReason,
}

/// The parsed manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Loadable entries in manifest order.
    pub services: Vec<ManagedServiceDefinition>,
    pub rejected: Vec<RejectedEntry>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.rejected.is_empty()
    }
}

/// Reads and parses the manifest at `path`.
///
/// A missing file yields an empty manifest. Readiness settings are merged from
/// the manifest `defaults`, the record's `settings` and the record's
/// `environments.<environment>`, on top of `fallback`.
pub async fn read_manifest(
    path: &Path,
    environment: &str,
    fallback: ReadinessPolicy,
) -> Result<Manifest, LoaderError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Manifest not found");
            return Ok(Manifest::default());
        }
        Err(e) => return Err(LoaderError::io(path, e)),
    };
    parse_manifest(&content, environment, fallback).map_err(|source| LoaderError::MalformedManifest {
        path: PathBuf::from(path),
        source,
    })
}

pub(crate) fn parse_manifest(
    content: &str,
    environment: &str,
    fallback: ReadinessPolicy,
) -> Result<Manifest, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Manifest::default());
    }
    let document: Option<ManifestDocument> = serde_yaml::from_str(content)?;
    let (defaults, records) = match document {
        None => return Ok(Manifest::default()),
        Some(ManifestDocument::List(records)) => (Settings::new(), records),
        Some(ManifestDocument::Mapping(ManifestMapping { defaults, services })) => (
            defaults.as_ref().map(settings_from_value).unwrap_or_default(),
            services,
        ),
    };

    let mut manifest = Manifest::default();
    for (index, raw) in records.into_iter().enumerate() {
        match parse_record(raw, &defaults, environment, fallback) {
            Ok(service) => {
                debug!(index, service = %service.name, kind = %service.kind, "Loaded manifest entry");
                manifest.services.push(service);
            }
            Err(rejected) => {
                let rejected = RejectedEntry { index, ..rejected };
                match &rejected.reason {
                    RejectReason::UnknownKind(kind) => {
                        warn!(index, name = ?rejected.name, kind = %kind, "Unknown service type, skipping")
                    }
                    RejectReason::Invalid(reason) => {
                        warn!(index, name = ?rejected.name, reason = %reason, "Invalid service definition")
                    }
                }
                manifest.rejected.push(rejected);
            }
        }
    }
    Ok(manifest)
}

fn parse_record(
    raw: Value,
    defaults: &Settings,
    environment: &str,
    fallback: ReadinessPolicy,
) -> Result<ManagedServiceDefinition, RejectedEntry> {
    let reject = |name: Option<String>, reason: RejectReason| RejectedEntry { index: 0, name, reason };

    let record: ManifestRecord = serde_yaml::from_value(raw)
        .map_err(|e| reject(None, RejectReason::Invalid(e.to_string())))?;
    let name = record.name.trim().to_string();
    let named = || (!name.is_empty()).then(|| name.clone());

    if name.is_empty() || record.kind.trim().is_empty() || record.config_dir.trim().is_empty() {
        return Err(reject(
            named(),
            RejectReason::Invalid("name, type and config_dir are required".to_string()),
        ));
    }
    let kind: BackendKind = record
        .kind
        .parse()
        .map_err(|_| reject(named(), RejectReason::UnknownKind(record.kind.clone())))?;

    let item = record.settings.as_ref().map(settings_from_value);
    let env = record.environments.get(environment).map(settings_from_value);
    let merged = merge(Some(defaults), item.as_ref(), env.as_ref());
    let readiness = resolve_readiness(merged, fallback)
        .map_err(|e| reject(named(), RejectReason::Invalid(format!("readiness settings: {e}"))))?;

    Ok(ManagedServiceDefinition::new(name, kind, record.config_dir.trim()).with_readiness(readiness))
}

fn resolve_readiness(merged: Settings, fallback: ReadinessPolicy) -> Result<ReadinessPolicy, String> {
    let overrides: ReadinessOverrides = settings_into(merged).map_err(|e| e.to_string())?;
    let delay = match overrides.retry_delay_secs {
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())?,
        None => fallback.delay,
    };
    Ok(ReadinessPolicy::new(
        overrides.max_attempts.unwrap_or(fallback.max_attempts),
        delay,
    ))
}
