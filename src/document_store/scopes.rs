//! Scope and collection declarations in `couchbase.yaml`.
//!
//! ```yaml
//! defaults:
//!   max_ttl: 0
//! scopes:
//!   - name: inventory
//!     collections:
//!       - name: items
//!         primary_index: true
//!         environments:
//!           prod: {max_ttl: 86400}
//! ```
//!
//! Collection settings are layered: file `defaults`, then the collection's
//! own keys, then its `environments.<ENVIRONMENT>` entry.

use super::DocumentStoreError;
use crate::settings::{sequence, settings_from_value, settings_into, NamedItem, Settings};
use serde::Deserialize;
use std::collections::HashSet;

const MAX_NAME_LEN: usize = 251;
const DEFAULT_SCOPE: &str = "_default";

/// A collection's resolved target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    /// Document expiry in seconds. `None` leaves the bucket default.
    pub max_ttl: Option<u32>,
    pub primary_index: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSpec {
    pub name: String,
    pub collections: Vec<CollectionSpec>,
}

#[derive(Debug, Deserialize)]
struct CollectionSettings {
    #[serde(default)]
    max_ttl: Option<u32>,
    #[serde(default)]
    primary_index: bool,
}

fn invalid(reason: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::InvalidConfig(reason.into())
}

/// Resolves every declared scope and collection for `environment`.
pub fn declared_scopes(content: &Settings, environment: &str) -> Result<Vec<ScopeSpec>, DocumentStoreError> {
    let defaults = content.get("defaults").map(settings_from_value).unwrap_or_default();
    let entries = sequence(content, "scopes").map_err(invalid)?;

    let mut scope_names = HashSet::new();
    let mut scopes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let scope = NamedItem::from_value(entry).map_err(|e| invalid(format!("scopes[{index}]: {e}")))?;
        validate_name("scope", &scope.name)?;
        if !scope_names.insert(scope.name.clone()) {
            return Err(invalid(format!("duplicate scope {}", scope.name)));
        }

        let mut collection_names = HashSet::new();
        let mut collections = Vec::new();
        for (index, entry) in sequence(&scope.settings, "collections")
            .map_err(|e| invalid(format!("scope {}: {e}", scope.name)))?
            .iter()
            .enumerate()
        {
            let item = NamedItem::from_value(entry)
                .map_err(|e| invalid(format!("scope {} collections[{index}]: {e}", scope.name)))?;
            validate_name("collection", &item.name)?;
            if !collection_names.insert(item.name.clone()) {
                return Err(invalid(format!("duplicate collection {}.{}", scope.name, item.name)));
            }
            let settings: CollectionSettings = settings_into(item.resolve(&defaults, environment))
                .map_err(|e| invalid(format!("collection {}.{}: {e}", scope.name, item.name)))?;
            collections.push(CollectionSpec {
                name: item.name,
                max_ttl: settings.max_ttl,
                primary_index: settings.primary_index,
            });
        }
        scopes.push(ScopeSpec {
            name: scope.name,
            collections,
        });
    }
    Ok(scopes)
}

/// Names end up in management URLs and query keyspaces, so only the
/// characters Couchbase itself accepts are allowed.
fn validate_name(what: &str, name: &str) -> Result<(), DocumentStoreError> {
    let legal_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '%'));
    let legal_start = !name.starts_with(['_', '%']) || name == DEFAULT_SCOPE;
    if name.len() <= MAX_NAME_LEN && legal_chars && legal_start {
        Ok(())
    } else {
        Err(invalid(format!("illegal {what} name {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str, environment: &str) -> Result<Vec<ScopeSpec>, DocumentStoreError> {
        let content: Settings = serde_yaml::from_str(yaml).unwrap();
        declared_scopes(&content, environment)
    }

    #[test]
    fn collection_settings_are_layered() {
        let yaml = r#"
defaults: {max_ttl: 60}
scopes:
  - name: inventory
    collections:
      - name: items
        primary_index: true
        environments:
          prod: {max_ttl: 0}
      - name: audit
"#;
        let dev = parse(yaml, "dev").unwrap();
        assert_eq!(
            dev,
            [ScopeSpec {
                name: "inventory".into(),
                collections: vec![
                    CollectionSpec { name: "items".into(), max_ttl: Some(60), primary_index: true },
                    CollectionSpec { name: "audit".into(), max_ttl: Some(60), primary_index: false },
                ],
            }]
        );
        let prod = parse(yaml, "prod").unwrap();
        assert_eq!(prod[0].collections[0].max_ttl, Some(0));
    }

    #[test]
    fn scopes_without_collections_are_allowed() {
        let scopes = parse("scopes: [{name: staging}, {name: _default, collections: [{name: c}]}]", "dev").unwrap();
        assert!(scopes[0].collections.is_empty());
        assert_eq!(scopes[1].name, "_default");
    }

    #[test]
    fn rejects_bad_declarations() {
        for yaml in [
            "scopes: {inventory: {}}",
            "scopes: [{name: inventory, collections: items}]",
            "scopes: [{name: 'in/ventory'}]",
            "scopes: [{name: _system}]",
            "scopes: [{name: a}, {name: a}]",
            "scopes: [{name: a, collections: [{name: c}, {name: c}]}]",
            "scopes: [{name: a, collections: [{name: c, max_ttl: -5}]}]",
        ] {
            assert!(
                matches!(parse(yaml, "dev"), Err(DocumentStoreError::InvalidConfig(_))),
                "{yaml} should be rejected"
            );
        }
    }
}
