//! Topic declarations in `redpanda.yaml`.
//!
//! ```yaml
//! defaults:
//!   partitions: 1
//!   replication_factor: 1
//! topics:
//!   - name: orders
//!     partitions: 6
//!     environments:
//!       prod: {replication_factor: 3}
//! ```

use super::EventBrokerError;
use crate::settings::{sequence, settings_from_value, settings_into, NamedItem, Settings};
use serde::Deserialize;
use std::collections::HashSet;

const MAX_TOPIC_NAME_LEN: usize = 249;

/// A topic's resolved target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

#[derive(Debug, Deserialize)]
struct TopicSettings {
    #[serde(default = "default_partitions")]
    partitions: i32,
    #[serde(default = "default_replication_factor")]
    replication_factor: i16,
}

fn default_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i16 {
    1
}

/// Resolves every declared topic for `environment`, in file order.
pub fn declared_topics(content: &Settings, environment: &str) -> Result<Vec<TopicSpec>, EventBrokerError> {
    let defaults = content.get("defaults").map(settings_from_value).unwrap_or_default();
    let entries = sequence(content, "topics").map_err(EventBrokerError::InvalidConfig)?;

    let mut seen = HashSet::new();
    let mut topics = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let item = NamedItem::from_value(entry)
            .map_err(|e| EventBrokerError::InvalidConfig(format!("topics[{index}]: {e}")))?;
        validate_name(&item.name)?;
        if !seen.insert(item.name.clone()) {
            return Err(EventBrokerError::InvalidConfig(format!("duplicate topic {}", item.name)));
        }

        let settings: TopicSettings = settings_into(item.resolve(&defaults, environment))
            .map_err(|e| EventBrokerError::InvalidConfig(format!("topic {}: {e}", item.name)))?;
        if settings.partitions < 1 || settings.replication_factor < 1 {
            return Err(EventBrokerError::InvalidConfig(format!(
                "topic {}: partitions and replication_factor must be at least 1",
                item.name
            )));
        }
        topics.push(TopicSpec {
            name: item.name,
            partitions: settings.partitions,
            replication_factor: settings.replication_factor,
        });
    }
    Ok(topics)
}

fn validate_name(name: &str) -> Result<(), EventBrokerError> {
    let legal = name.len() <= MAX_TOPIC_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if legal {
        Ok(())
    } else {
        Err(EventBrokerError::InvalidConfig(format!("illegal topic name {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str, environment: &str) -> Result<Vec<TopicSpec>, EventBrokerError> {
        let content: Settings = serde_yaml::from_str(yaml).unwrap();
        declared_topics(&content, environment)
    }

    const CONFIG: &str = r#"
defaults:
  partitions: 3
topics:
  - name: orders
    partitions: 6
    environments:
      prod: {replication_factor: 3}
  - name: audit.log
"#;

    #[test]
    fn environment_overrides_apply_to_their_environment_only() {
        let prod = parse(CONFIG, "prod").unwrap();
        assert_eq!(
            prod,
            [
                TopicSpec { name: "orders".into(), partitions: 6, replication_factor: 3 },
                TopicSpec { name: "audit.log".into(), partitions: 3, replication_factor: 1 },
            ]
        );
        let dev = parse(CONFIG, "dev").unwrap();
        assert_eq!(dev[0].replication_factor, 1);
    }

    #[test]
    fn missing_topics_key_declares_nothing() {
        assert!(parse("defaults: {partitions: 2}", "dev").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_declarations() {
        for yaml in [
            "topics: orders",
            "topics: [{partitions: 2}]",
            "topics: [{name: 'bad name'}]",
            "topics: [{name: a}, {name: a}]",
            "topics: [{name: a, partitions: 0}]",
            "topics: [{name: a, partitions: many}]",
        ] {
            assert!(
                matches!(parse(yaml, "dev"), Err(EventBrokerError::InvalidConfig(_))),
                "{yaml} should be rejected"
            );
        }
    }
}
