//! Per-namespace runtime configuration.
//!
//! A [`ConfigMap`] maps a sub-application namespace to an arbitrary JSON
//! config object. Namespaces keep insertion order (the host app first), which
//! is the order config meta tags are emitted into the HTML entry document.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered namespace → config mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: Vec<(String, Value)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the config for a namespace. A replaced namespace keeps
    /// its original position.
    pub fn insert(&mut self, namespace: impl Into<String>, config: Value) {
        let namespace = namespace.into();
        match self.entries.iter_mut().find(|(name, _)| *name == namespace) {
            Some((_, existing)) => *existing = config,
            None => self.entries.push((namespace, config)),
        }
    }

    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == namespace)
            .map(|(_, config)| config)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.get(namespace).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deep-merge another map into this one.
    ///
    /// Namespaces new to `self` are appended in `other`'s order. Shared
    /// namespaces are merged with [`deep_merge`]: `other` wins on scalar
    /// conflicts, arrays union.
    pub fn merge(&mut self, other: ConfigMap) {
        for (namespace, incoming) in other.entries {
            match self.entries.iter_mut().find(|(name, _)| *name == namespace) {
                Some((_, existing)) => deep_merge(existing, incoming),
                None => self.entries.push((namespace, incoming)),
            }
        }
    }
}

/// Merge `source` into `target`.
///
/// Objects merge key by key, recursively. Arrays union: items of `source` not
/// already present in `target` are appended in order. Any other combination
/// replaces `target` with `source`.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, incoming) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, incoming),
                    None => {
                        target_map.insert(key, incoming);
                    }
                }
            }
        }
        (Value::Array(target_items), Value::Array(source_items)) => {
            for item in source_items {
                if !target_items.contains(&item) {
                    target_items.push(item);
                }
            }
        }
        (target, source) => *target = source,
    }
}

impl FromIterator<(String, Value)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (namespace, config) in iter {
            map.insert(namespace, config);
        }
        map
    }
}

impl Serialize for ConfigMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (namespace, config) in &self.entries {
            map.serialize_entry(namespace, config)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfigMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ConfigMapVisitor)
    }
}

/// Collects entries in document order; a `serde_json::Map` would sort them.
struct ConfigMapVisitor;

impl<'de> Visitor<'de> for ConfigMapVisitor {
    type Value = ConfigMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of namespace to config object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigMap, A::Error> {
        let mut map = ConfigMap::new();
        while let Some((namespace, config)) = access.next_entry::<String, Value>()? {
            map.insert(namespace, config);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_keeps_first_position() {
        let mut map = ConfigMap::new();
        map.insert("app", json!({ "a": 1 }));
        map.insert("addon", json!({}));
        map.insert("app", json!({ "a": 2 }));

        let names: Vec<&str> = map.namespaces().collect();
        assert_eq!(names, vec!["app", "addon"]);
        assert_eq!(map.get("app"), Some(&json!({ "a": 2 })));
    }

    #[test]
    fn merge_overrides_scalars_recursively() {
        let mut target = json!({ "a": 1, "nested": { "x": "old", "keep": true } });
        deep_merge(&mut target, json!({ "a": 2, "nested": { "x": "new" } }));
        assert_eq!(
            target,
            json!({ "a": 2, "nested": { "x": "new", "keep": true } })
        );
    }

    #[test]
    fn merge_unions_arrays() {
        let mut target = json!({ "hosts": ["a", "b"] });
        deep_merge(&mut target, json!({ "hosts": ["b", "c"] }));
        assert_eq!(target, json!({ "hosts": ["a", "b", "c"] }));
    }

    #[test]
    fn merge_appends_new_namespaces_in_order() {
        let mut map = ConfigMap::new();
        map.insert("app", json!({ "modulePrefix": "app" }));

        let mut contribution = ConfigMap::new();
        contribution.insert("z-addon", json!({ "on": true }));
        contribution.insert("app", json!({ "extra": 1 }));
        contribution.insert("a-addon", json!({}));
        map.merge(contribution);

        let names: Vec<&str> = map.namespaces().collect();
        assert_eq!(names, vec!["app", "z-addon", "a-addon"]);
        assert_eq!(
            map.get("app"),
            Some(&json!({ "modulePrefix": "app", "extra": 1 }))
        );
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut map = ConfigMap::new();
        map.insert("b", json!(1));
        map.insert("a", json!(2));
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn deserializes_in_document_order() {
        let map: ConfigMap =
            serde_json::from_str(r#"{"z-addon":{"on":true},"app":{},"a-addon":{"on":false}}"#)
                .unwrap();
        let names: Vec<&str> = map.namespaces().collect();
        assert_eq!(names, vec!["z-addon", "app", "a-addon"]);
        assert_eq!(map.get("a-addon"), Some(&json!({ "on": false })));
    }
}
