//! Layered settings and the precedence merge.
//!
//! Three layers are combined with `env_settings > item_defaults > global_defaults`.
//! The merge is a shallow key overwrite: a nested mapping in a higher layer
//! replaces the lower layer's value wholesale.

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// A string-keyed map of structured values.
pub type Settings = BTreeMap<String, Value>;

/// Merges the three layers. Absent layers count as empty.
pub fn merge(global: Option<&Settings>, item: Option<&Settings>, env: Option<&Settings>) -> Settings {
    let mut result = Settings::new();
    for layer in [global, item, env].into_iter().flatten() {
        result.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    result
}

/// The three layers of a setting, lowest precedence first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayeredSettings {
    pub global_defaults: Settings,
    pub item_defaults: Settings,
    pub env_settings: Settings,
}

impl LayeredSettings {
    pub fn resolve(&self) -> Settings {
        merge(
            Some(&self.global_defaults),
            Some(&self.item_defaults),
            Some(&self.env_settings),
        )
    }
}

/// Converts a YAML mapping into [`Settings`], dropping non-string keys.
///
/// Anything that is not a mapping degrades to an empty map.
pub fn settings_from_value(value: &Value) -> Settings {
    match value {
        Value::Mapping(map) => map
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
            .collect(),
        _ => Settings::new(),
    }
}

/// Deserializes merged settings into a typed struct.
pub fn settings_into<T: DeserializeOwned>(settings: Settings) -> Result<T, serde_yaml::Error> {
    let mapping = settings
        .into_iter()
        .map(|(k, v)| (Value::String(k), v))
        .collect::<serde_yaml::Mapping>();
    serde_yaml::from_value(Value::Mapping(mapping))
}

/// A named entry of a structured config (a collection, a topic) with its
/// inline settings and per-environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedItem {
    pub name: String,
    /// Every key except `name` and `environments`.
    pub settings: Settings,
    pub environments: BTreeMap<String, Settings>,
}

impl NamedItem {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        if !value.is_mapping() {
            return Err("expected a mapping".to_string());
        }
        let mut settings = settings_from_value(value);
        let name = match settings.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err("entry has no name".to_string()),
        };
        let environments = match settings.remove("environments") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Mapping(envs)) => envs
                .iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), settings_from_value(v))))
                .collect(),
            Some(_) => return Err(format!("{name}: environments must be a mapping")),
        };
        Ok(Self {
            name,
            settings,
            environments,
        })
    }

    /// Layers `defaults`, the inline settings and the `environment` overrides.
    pub fn resolve(&self, defaults: &Settings, environment: &str) -> Settings {
        LayeredSettings {
            global_defaults: defaults.clone(),
            item_defaults: self.settings.clone(),
            env_settings: self.environments.get(environment).cloned().unwrap_or_default(),
        }
        .resolve()
    }
}

/// Reads an optional sequence under `key`. A missing or null key is empty.
pub fn sequence<'a>(settings: &'a Settings, key: &str) -> Result<&'a [Value], String> {
    match settings.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(items)) => Ok(items),
        Some(_) => Err(format!("`{key}` must be a list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings(pairs: &[(&str, i64)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn env_beats_item_beats_global() {
        let global = settings(&[("a", 1), ("b", 1), ("c", 1)]);
        let item = settings(&[("b", 2), ("c", 2)]);
        let env = settings(&[("c", 3)]);

        let merged = merge(Some(&global), Some(&item), Some(&env));
        assert_eq!(merged, settings(&[("a", 1), ("b", 2), ("c", 3)]));
    }

    #[test]
    fn absent_layers_are_empty() {
        let item = settings(&[("x", 7)]);
        assert_eq!(merge(None, Some(&item), None), item);
        assert!(merge(None, None, None).is_empty());
    }

    #[test]
    fn nested_values_are_replaced_not_merged() {
        let global: Settings =
            serde_yaml::from_str("config: {retention_ms: 1000, cleanup: delete}").unwrap();
        let env: Settings = serde_yaml::from_str("config: {retention_ms: 5}").unwrap();

        let merged = merge(Some(&global), None, Some(&env));
        let config = merged.get("config").unwrap();
        assert_eq!(config.get("retention_ms"), Some(&Value::from(5)));
        assert!(config.get("cleanup").is_none());
    }

    #[test]
    fn layered_struct_resolves_like_merge() {
        let layers = LayeredSettings {
            global_defaults: settings(&[("partitions", 1)]),
            item_defaults: settings(&[("partitions", 3)]),
            env_settings: Settings::new(),
        };
        assert_eq!(layers.resolve(), settings(&[("partitions", 3)]));
    }

    #[test]
    fn non_mapping_values_degrade_to_empty() {
        assert!(settings_from_value(&Value::from("scalar")).is_empty());
        assert!(settings_from_value(&Value::Null).is_empty());
    }

    #[test]
    fn named_item_layers_defaults_inline_and_environment() {
        let value: Value = serde_yaml::from_str(
            "{name: orders, partitions: 6, environments: {prod: {replication_factor: 3}}}",
        )
        .unwrap();
        let item = NamedItem::from_value(&value).unwrap();
        assert_eq!(item.name, "orders");
        assert!(!item.settings.contains_key("environments"));

        let defaults = settings(&[("partitions", 1), ("replication_factor", 1)]);
        assert_eq!(
            item.resolve(&defaults, "prod"),
            settings(&[("partitions", 6), ("replication_factor", 3)])
        );
        assert_eq!(
            item.resolve(&defaults, "dev"),
            settings(&[("partitions", 6), ("replication_factor", 1)])
        );
    }

    #[test]
    fn named_item_requires_a_name() {
        let value: Value = serde_yaml::from_str("{partitions: 6}").unwrap();
        assert!(NamedItem::from_value(&value).is_err());
        assert!(NamedItem::from_value(&Value::from("orders")).is_err());
    }

    #[test]
    fn sequence_rejects_non_lists() {
        let content: Settings = serde_yaml::from_str("topics: {orders: 1}").unwrap();
        assert!(sequence(&content, "topics").is_err());
        assert!(sequence(&content, "scopes").unwrap().is_empty());
    }

    fn arb_settings() -> impl Strategy<Value = Settings> {
        prop::collection::btree_map("[a-e]", any::<i64>().prop_map(Value::from), 0..5)
    }

    proptest! {
        #[test]
        fn disjoint_layers_merge_to_union(
            g in prop::collection::btree_map("g[a-z]{1,3}", any::<i64>().prop_map(Value::from), 0..4),
            i in prop::collection::btree_map("i[a-z]{1,3}", any::<i64>().prop_map(Value::from), 0..4),
            e in prop::collection::btree_map("e[a-z]{1,3}", any::<i64>().prop_map(Value::from), 0..4),
        ) {
            let merged = merge(Some(&g), Some(&i), Some(&e));
            prop_assert_eq!(merged.len(), g.len() + i.len() + e.len());
            for layer in [&g, &i, &e] {
                for (k, v) in layer {
                    prop_assert_eq!(merged.get(k), Some(v));
                }
            }
        }

        #[test]
        fn highest_present_layer_wins(g in arb_settings(), i in arb_settings(), e in arb_settings()) {
            let merged = merge(Some(&g), Some(&i), Some(&e));
            for (k, v) in &merged {
                let expected = e.get(k).or_else(|| i.get(k)).or_else(|| g.get(k));
                prop_assert_eq!(Some(v), expected);
            }
        }

        #[test]
        fn merge_is_idempotent(g in arb_settings(), i in arb_settings(), e in arb_settings()) {
            let once = merge(Some(&g), Some(&i), Some(&e));
            let empty = Settings::new();
            prop_assert_eq!(merge(Some(&once), Some(&empty), Some(&empty)), once.clone());
        }
    }
}
