//! Per-service connection credentials, read from `<PREFIX>_*` variables.

use super::BackendKind;
use thiserror::Error;

/// Errors raised while resolving a [`ConnectionTarget`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    /// None of the accepted variable names for a required field is set.
    #[error("missing environment variable: {}", .0.join(" or "))]
    MissingVariable(Vec<String>),
}

/// The fields a connection target carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    Host,
    Database,
    Principal,
    Secret,
    Protocol,
}

impl TargetField {
    /// Accepted variable suffixes, in lookup order.
    const fn suffixes(self) -> &'static [&'static str] {
        match self {
            TargetField::Host => &["HOST"],
            TargetField::Database => &["DB", "BUCKET"],
            TargetField::Principal => &["USER", "USERNAME"],
            TargetField::Secret => &["PASSWORD"],
            TargetField::Protocol => &["PROTOCOL"],
        }
    }

    /// Couchbase deployments name the bucket and user the other way round.
    const fn document_store_suffixes(self) -> &'static [&'static str] {
        match self {
            TargetField::Database => &["BUCKET", "DB"],
            TargetField::Principal => &["USERNAME", "USER"],
            other => other.suffixes(),
        }
    }
}

fn required_fields(kind: BackendKind) -> &'static [TargetField] {
    use TargetField::*;
    match kind {
        BackendKind::DocumentStore => &[Host, Database, Principal, Secret, Protocol],
        BackendKind::Relational => &[Host, Database, Principal, Secret],
        BackendKind::EventBroker => &[Host],
    }
}

/// Credential bundle for one managed service.
///
/// Resolved once when a controller is constructed. Required fields are
/// checked up front so a missing variable fails that service before any
/// connection attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub principal: Option<String>,
    pub secret: Option<String>,
    pub database: Option<String>,
    pub protocol: Option<String>,
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("principal", &self.principal)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl ConnectionTarget {
    /// Resolves the target for `kind` from the process environment.
    pub fn from_env(kind: BackendKind, prefix: &str) -> Result<Self, TargetError> {
        Self::resolve(kind, prefix, |key| std::env::var(key).ok())
    }

    /// Resolves the target using `lookup` for variable values. Empty values
    /// count as unset.
    pub fn resolve<F>(kind: BackendKind, prefix: &str, lookup: F) -> Result<Self, TargetError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |field: TargetField| -> Option<String> {
            let suffixes = match kind {
                BackendKind::DocumentStore => field.document_store_suffixes(),
                _ => field.suffixes(),
            };
            suffixes
                .iter()
                .filter_map(|suffix| lookup(&format!("{prefix}_{suffix}")))
                .find(|value| !value.trim().is_empty())
        };

        for field in required_fields(kind) {
            if read(*field).is_none() {
                let suffixes = match kind {
                    BackendKind::DocumentStore => field.document_store_suffixes(),
                    _ => field.suffixes(),
                };
                return Err(TargetError::MissingVariable(
                    suffixes.iter().map(|s| format!("{prefix}_{s}")).collect(),
                ));
            }
        }

        Ok(Self {
            host: read(TargetField::Host).unwrap_or_default(),
            principal: read(TargetField::Principal),
            secret: read(TargetField::Secret),
            database: read(TargetField::Database),
            protocol: read(TargetField::Protocol),
        })
    }

    /// Returns the value of an optional field, or an error naming it.
    pub fn require(&self, field: TargetField) -> Result<&str, TargetError> {
        let value = match field {
            TargetField::Host => Some(self.host.as_str()),
            TargetField::Database => self.database.as_deref(),
            TargetField::Principal => self.principal.as_deref(),
            TargetField::Secret => self.secret.as_deref(),
            TargetField::Protocol => self.protocol.as_deref(),
        };
        value.ok_or_else(|| {
            TargetError::MissingVariable(field.suffixes().iter().map(|s| s.to_string()).collect())
        })
    }

    /// Splits `host` into host and port, using `default_port` when none is given.
    pub fn host_and_port(&self, default_port: u16) -> (&str, u16) {
        if let Some((host, port)) = self.host.rsplit_once(':') {
            // Bare IPv6 literals carry colons of their own.
            let bracketed_or_plain = !host.contains(':') || host.starts_with('[');
            if let (true, Ok(port)) = (bracketed_or_plain, port.parse()) {
                return (host, port);
            }
        }
        (self.host.as_str(), default_port)
    }
}
