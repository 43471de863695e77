use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A tag name. Case rules and allowed characters belong to the backing store.
pub type TagKey = String;

/// A tag value. The empty string is a real value, distinct from "no tag".
pub type TagValue = String;

/// The tags attached to one entity, keyed by tag name.
///
/// Presence is decided by the key alone: a key mapped to `""` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<TagKey, TagValue>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tag set holding exactly one `key = value` pair.
    pub fn single(key: impl Into<TagKey>, value: impl Into<TagValue>) -> Self {
        let mut tags = Self::new();
        tags.insert(key, value);
        tags
    }

    /// Look up a key. `Some("")` means present with an empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<TagKey>, value: impl Into<TagValue>) -> Option<TagValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<TagValue> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply merge semantics: every pair in `other` is inserted or overwritten.
    pub fn merge_from(&mut self, other: &TagSet) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    /// Apply delete semantics: each pair in `other` is removed only if the
    /// current value matches. Returns the number of keys removed.
    pub fn delete_matching(&mut self, other: &TagSet) -> usize {
        let mut removed = 0;
        for (k, v) in other.iter() {
            if self.get(k) == Some(v) {
                self.0.remove(k);
                removed += 1;
            }
        }
        removed
    }
}

impl<K: Into<TagKey>, V: Into<TagValue>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TagSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// What kind of entity is being renamed. Only reporting cares; both kinds
/// go through the same rename path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Resource,
    ResourceGroup,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Resource => "resource",
            EntityKind::ResourceGroup => "resource group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resource or resource group selected for renaming, with the tags it
/// carried when it was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntity {
    /// Stable identifier, e.g. a resource URI.
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    /// Account (subscription) the entity lives in.
    pub account: String,
    pub tags: TagSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_present() {
        let tags = TagSet::single("env", "");
        assert_eq!(tags.get("env"), Some(""));
        assert!(tags.contains_key("env"));
        assert_eq!(tags.get("owner"), None);
    }

    #[test]
    fn merge_from_overwrites_and_keeps_others() {
        let mut tags: TagSet = [("env", "prod"), ("owner", "alice")].into_iter().collect();
        tags.merge_from(&TagSet::single("env", "dev"));
        tags.merge_from(&TagSet::single("environment", "prod"));
        assert_eq!(tags.get("env"), Some("dev"));
        assert_eq!(tags.get("owner"), Some("alice"));
        assert_eq!(tags.get("environment"), Some("prod"));
    }

    #[test]
    fn delete_matching_requires_equal_value() {
        let mut tags: TagSet = [("env", "prod"), ("owner", "alice")].into_iter().collect();
        assert_eq!(tags.delete_matching(&TagSet::single("env", "dev")), 0);
        assert_eq!(tags.get("env"), Some("prod"));
        assert_eq!(tags.delete_matching(&TagSet::single("env", "prod")), 1);
        assert_eq!(tags.get("env"), None);
        assert_eq!(tags.delete_matching(&TagSet::single("missing", "x")), 0);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn tag_set_serializes_as_plain_object() {
        let tags = TagSet::single("env", "");
        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json, serde_json::json!({"env": ""}));
        let back: TagSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, tags);
    }

    #[test]
    fn entity_kind_uses_snake_case() {
        let kind: EntityKind = serde_json::from_str("\"resource_group\"").unwrap();
        assert_eq!(kind, EntityKind::ResourceGroup);
        assert_eq!(kind.to_string(), "resource group");
    }
}
