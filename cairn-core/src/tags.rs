//! Tags - Key/value tag sets and their reconciliation
//!
//! Tags come from three places: the resource's `tags` attribute, the
//! provider-wide default tags, and what the API reports back. The API also
//! returns tags the user never manages (system tags with the `aws:` prefix,
//! keys ignored by configuration), which must not show up as drift.

use std::collections::{BTreeMap, HashMap};

use crate::provider::{ProviderError, ProviderResult};
use crate::resource::Value;

/// Prefix of tags managed by the cloud itself
pub const SYSTEM_TAG_PREFIX: &str = "aws:";

/// An ordered set of string tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `Value::Map` of strings
    pub fn from_value(value: &Value) -> ProviderResult<Self> {
        let Value::Map(map) = value else {
            return Err(ProviderError::validation("tags must be a map"));
        };
        map.iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                other => Err(ProviderError::validation(format!(
                    "tag '{}' must be a string, got {:?}",
                    k, other
                ))),
            })
            .collect()
    }

    /// Build from a CloudFormation-style `[{"Key": .., "Value": ..}]` array
    pub fn from_cloudformation(json: &serde_json::Value) -> Self {
        json.as_array()
            .into_iter()
            .flatten()
            .filter_map(|tag| {
                let key = tag.get("Key")?.as_str()?;
                let value = tag.get("Value")?.as_str()?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
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

    /// Drop tags managed by the cloud itself
    pub fn ignore_system(mut self) -> Self {
        self.0.retain(|k, _| !k.starts_with(SYSTEM_TAG_PREFIX));
        self
    }

    /// Drop tags the configuration asks to ignore
    pub fn ignore(mut self, config: &IgnoreConfig) -> Self {
        self.0.retain(|k, _| !config.is_ignored(k));
        self
    }

    /// Union of both sets; `other` wins on conflicting keys
    pub fn merge(mut self, other: &KeyValueTags) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    /// Tags present here but absent from `new`
    pub fn removed(&self, new: &KeyValueTags) -> KeyValueTags {
        self.0
            .iter()
            .filter(|(k, _)| !new.0.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tags in `new` that are absent here or carry a different value
    pub fn updated(&self, new: &KeyValueTags) -> KeyValueTags {
        new.0
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn to_map_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<HashMap<_, _>>(),
        )
    }

    pub fn to_cloudformation(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.0
                .iter()
                .map(|(k, v)| serde_json::json!({"Key": k, "Value": v}))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tag keys excluded from drift detection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreConfig {
    pub fn is_ignored(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p))
    }
}

/// Tags applied to every taggable resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultTagsConfig {
    pub tags: KeyValueTags,
}

impl DefaultTagsConfig {
    pub fn new(tags: KeyValueTags) -> Self {
        Self { tags }
    }

    /// Tags to send for a resource: defaults overlaid with the resource's own
    pub fn merge_tags(&self, resource_tags: &KeyValueTags) -> KeyValueTags {
        self.tags.clone().merge(resource_tags)
    }

    /// Tags the resource should report in state: drop defaults the resource
    /// does not set itself, unless the remote value differs from the default
    pub fn strip_defaults(&self, remote: &KeyValueTags) -> KeyValueTags {
        remote
            .iter()
            .filter(|(k, v)| self.tags.get(k) != Some(*v))
            .collect()
    }
}
