//! AWS Cloud Control Provider implementation
//!
//! CRUD handlers shared by every resource definition. Each mutating call is
//! retried on the definition's retryable errors, followed through its
//! request token, and then confirmed by reading the resource back.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use cairn_core::finder::not_found_to_none;
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, State, Value};
use cairn_core::retry::{RetryPolicy, retry_when};
use cairn_core::tags::{DefaultTagsConfig, IgnoreConfig, KeyValueTags, SYSTEM_TAG_PREFIX};
use cairn_core::timeouts::{Operation, Timeouts, deadline_after};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Value as Json, json};
use thiserror::Error;
use tokio::time::Instant;

use crate::api::{CloudControlApi, HANDLER_NOT_FOUND, RESOURCE_NOT_FOUND, SdkCloudControl};
use crate::expand::{expand_attribute, expand_attributes};
use crate::finder::find_resource_by_id;
use crate::flatten::flatten_properties;
use crate::resources::ResourceDefinition;
use crate::schemas::{TAGS_ATTRIBUTE, definitions};
use crate::utils::{is_valid_region, normalize_region};
use crate::wait::{wait_operation_complete, wait_resource_deleted, wait_resource_exists};

const TAGS_PROPERTY: &str = "Tags";
const DEFAULT_MAX_RETRIES: u32 = 25;

/// Tag keys excluded from drift detection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IgnoreTagsConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

/// Provider configuration, the `provider` block of the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AwsccProviderConfig {
    /// Region; `AWS_REGION` or the profile's region when unset
    pub region: Option<String>,
    /// Tags applied to every taggable resource
    pub default_tags: BTreeMap<String, String>,
    pub ignore_tags: IgnoreTagsConfig,
    /// Attempts made by the SDK for each API call
    pub max_retries: u32,
}

impl Default for AwsccProviderConfig {
    fn default() -> Self {
        Self {
            region: None,
            default_tags: BTreeMap::new(),
            ignore_tags: IgnoreTagsConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid region '{0}'")]
    InvalidRegion(String),

    #[error("default tag '{0}' uses the reserved '{prefix}' prefix", prefix = SYSTEM_TAG_PREFIX)]
    ReservedTagKey(String),
}

impl AwsccProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = self.region()
            && !is_valid_region(&region)
        {
            return Err(ConfigError::InvalidRegion(region));
        }
        if let Some(key) = self
            .default_tags
            .keys()
            .find(|k| k.starts_with(SYSTEM_TAG_PREFIX))
        {
            return Err(ConfigError::ReservedTagKey(key.clone()));
        }
        Ok(())
    }

    /// Configured region in its canonical form (e.g., "us-east-1")
    pub fn region(&self) -> Option<String> {
        self.region.as_deref().map(normalize_region)
    }
}

/// AWS Cloud Control Provider
pub struct AwsccProvider<A = SdkCloudControl> {
    api: A,
    definitions: HashMap<&'static str, ResourceDefinition>,
    default_tags: DefaultTagsConfig,
    ignore_tags: IgnoreConfig,
}

impl AwsccProvider<SdkCloudControl> {
    /// Create a provider talking to AWS with credentials from the environment
    pub async fn new(config: AwsccProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let api = SdkCloudControl::new(config.region().as_deref(), config.max_retries).await;
        Self::with_api(api, config)
    }
}

impl<A: CloudControlApi> AwsccProvider<A> {
    pub fn with_api(api: A, config: AwsccProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api,
            definitions: definitions()
                .into_iter()
                .map(|d| (d.resource_type, d))
                .collect(),
            default_tags: DefaultTagsConfig::new(config.default_tags.into_iter().collect()),
            ignore_tags: IgnoreConfig {
                keys: config.ignore_tags.keys,
                key_prefixes: config.ignore_tags.key_prefixes,
            },
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Definitions sorted by resource type
    pub fn definitions(&self) -> Vec<&ResourceDefinition> {
        let mut defs: Vec<_> = self.definitions.values().collect();
        defs.sort_by_key(|d| d.resource_type);
        defs
    }

    fn definition(&self, id: &ResourceId) -> ProviderResult<&ResourceDefinition> {
        self.definitions
            .get(id.resource_type.as_str())
            .ok_or_else(|| {
                ProviderError::validation(format!("unknown resource type '{}'", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        timeouts: &Timeouts,
    ) -> ProviderResult<State> {
        let def = self.definition(id)?;
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };

        let timeout = def.lifecycle.timeout(Operation::Read, timeouts);
        let found = tokio::time::timeout(
            timeout,
            find_resource_by_id(&self.api, def.aws_type_name, identifier),
        )
        .await
        .map_err(|_| {
            ProviderError::timeout(format!("reading {} ({}) timed out after {:?}", id, identifier, timeout))
                .for_resource(id.clone())
        })?;

        match not_found_to_none(found).map_err(|e| e.for_resource(id.clone()))? {
            Some(properties) => Ok(self.build_state(def, id, identifier, &properties)),
            None => {
                info!("{} ({}) not found, removing from state", id, identifier);
                Ok(State::not_found(id.clone()))
            }
        }
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let def = self.definition(id)?;
        let desired = self.desired_properties(def, &resource.attributes)?;

        let timeout = def.lifecycle.timeout(Operation::Create, &resource.timeouts);
        let deadline = deadline_after(timeout);
        info!("Creating {}", id);

        let api = &self.api;
        let desired = &desired;
        let event = retry_when(
            &RetryPolicy::new(timeout),
            move || async move {
                let event = api.create_resource(def.aws_type_name, desired).await?;
                wait_operation_complete(api, &event.request_token, remaining(deadline)).await
            },
            |e| def.lifecycle.is_retryable(e),
        )
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = event.identifier.ok_or_else(|| {
            ProviderError::new("create succeeded without returning an identifier").for_resource(id.clone())
        })?;
        let properties = wait_resource_exists(api, def, &identifier, remaining(deadline))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut state = self.build_state(def, id, &identifier, &properties);
        carry_write_only(def, &resource.attributes, &mut state.attributes);
        info!("Created {} ({})", id, identifier);
        Ok(state)
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let def = self.definition(id)?;
        if !def.updatable {
            return Err(ProviderError::validation(format!(
                "{} cannot be updated in place",
                id.resource_type
            ))
            .for_resource(id.clone()));
        }

        let mut patch = self.patch_document(def, from, to)?;
        if let Some(tags) = self.changed_tags(def, from, to)? {
            let unmanaged = self
                .unmanaged_tags(def, identifier)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
            patch.push(json!({
                "op": "add",
                "path": format!("/{}", TAGS_PROPERTY),
                "value": unmanaged.merge(&tags).to_cloudformation(),
            }));
        }
        if patch.is_empty() {
            debug!("{} ({}) has nothing to patch", id, identifier);
            return self.read_resource(id, Some(identifier), &to.timeouts).await;
        }

        let timeout = def.lifecycle.timeout(Operation::Update, &to.timeouts);
        let deadline = deadline_after(timeout);
        info!("Updating {} ({})", id, identifier);
        debug!("patch for {}: {}", id, Json::Array(patch.clone()));

        let api = &self.api;
        let patch = &patch;
        retry_when(
            &RetryPolicy::new(timeout),
            move || async move {
                let event = api.update_resource(def.aws_type_name, identifier, patch).await?;
                wait_operation_complete(api, &event.request_token, remaining(deadline)).await
            },
            |e| def.lifecycle.is_retryable(e),
        )
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

        let properties = wait_resource_exists(api, def, identifier, remaining(deadline))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut state = self.build_state(def, id, identifier, &properties);
        carry_write_only(def, &to.attributes, &mut state.attributes);
        info!("Updated {} ({})", id, identifier);
        Ok(state)
    }

    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: &Timeouts,
    ) -> ProviderResult<()> {
        let def = self.definition(id)?;
        let timeout = def.lifecycle.timeout(Operation::Delete, timeouts);
        let deadline = deadline_after(timeout);
        info!("Deleting {} ({})", id, identifier);

        let api = &self.api;
        let result = retry_when(
            &RetryPolicy::new(timeout),
            move || async move {
                let event = api.delete_resource(def.aws_type_name, identifier).await?;
                wait_operation_complete(api, &event.request_token, remaining(deadline)).await
            },
            |e| def.lifecycle.is_retryable(e),
        )
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_already_gone(&e) => {
                info!("{} ({}) was already deleted", id, identifier);
                return Ok(());
            }
            Err(e) => return Err(e.for_resource(id.clone())),
        }

        wait_resource_deleted(api, def, identifier, remaining(deadline))
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        info!("Deleted {} ({})", id, identifier);
        Ok(())
    }

    /// Drop desired tags that only repeat a default tag, as reads do
    pub fn normalize_resource(&self, mut resource: Resource) -> Resource {
        let Ok(def) = self.definition(&resource.id) else {
            return resource;
        };
        if !def.has_tags {
            return resource;
        }
        if let Some(tags) = resource.attributes.get(TAGS_ATTRIBUTE)
            && let Ok(tags) = KeyValueTags::from_value(tags)
        {
            let stripped = self.default_tags.strip_defaults(&tags);
            resource
                .attributes
                .insert(TAGS_ATTRIBUTE.to_string(), stripped.to_map_value());
        }
        resource
    }

    // =========================================================================
    // Mapping Helpers
    // =========================================================================

    fn build_state(
        &self,
        def: &ResourceDefinition,
        id: &ResourceId,
        identifier: &str,
        properties: &Json,
    ) -> State {
        let mut attributes = flatten_properties(&def.schema, properties);
        if def.has_tags {
            let remote = KeyValueTags::from_cloudformation(properties.get(TAGS_PROPERTY).unwrap_or(&Json::Null))
                .ignore_system()
                .ignore(&self.ignore_tags);
            let tags = self.default_tags.strip_defaults(&remote);
            attributes.insert(TAGS_ATTRIBUTE.to_string(), tags.to_map_value());
        }
        State::existing(id.clone(), attributes).with_identifier(identifier)
    }

    fn resource_tags(&self, attributes: &HashMap<String, Value>) -> ProviderResult<KeyValueTags> {
        match attributes.get(TAGS_ATTRIBUTE) {
            Some(tags) => KeyValueTags::from_value(tags),
            None => Ok(KeyValueTags::new()),
        }
    }

    fn desired_properties(
        &self,
        def: &ResourceDefinition,
        attributes: &HashMap<String, Value>,
    ) -> ProviderResult<Json> {
        let mut properties = expand_attributes(&def.schema, attributes)?;
        if def.has_tags {
            let tags = self.default_tags.merge_tags(&self.resource_tags(attributes)?);
            if !tags.is_empty() {
                properties.insert(TAGS_PROPERTY.to_string(), tags.to_cloudformation());
            }
        }
        Ok(Json::Object(properties))
    }

    /// RFC 6902 operations turning `from` into `to`
    fn patch_document(
        &self,
        def: &ResourceDefinition,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<Vec<Json>> {
        let schema = &def.schema;
        let mut names: Vec<&String> = to.attributes.keys().collect();
        names.sort();

        let mut ops = Vec::new();
        for name in names {
            if name == TAGS_ATTRIBUTE || schema.is_computed_only(name) {
                continue;
            }
            let desired = &to.attributes[name];
            let op = match from.attributes.get(name) {
                Some(current) if schema.canonicalize(name, current) == schema.canonicalize(name, desired) => {
                    continue;
                }
                Some(_) => "replace",
                None if schema.is_write_only(name) => continue,
                None => "add",
            };
            let (key, value) = expand_attribute(schema, name, desired)?;
            ops.push(json!({"op": op, "path": format!("/{}", key), "value": value}));
        }

        Ok(ops)
    }

    /// Managed tags to send, merged with the defaults, when they changed
    fn changed_tags(
        &self,
        def: &ResourceDefinition,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<Option<KeyValueTags>> {
        if !def.has_tags || !to.attributes.contains_key(TAGS_ATTRIBUTE) {
            return Ok(None);
        }
        let old = self.resource_tags(&from.attributes)?;
        let new = self.resource_tags(&to.attributes)?;
        if old.removed(&new).is_empty() && old.updated(&new).is_empty() {
            return Ok(None);
        }
        Ok(Some(self.default_tags.merge_tags(&new)))
    }

    /// Remote tags matched by `ignore_tags`, which a Tags patch must keep
    async fn unmanaged_tags(&self, def: &ResourceDefinition, identifier: &str) -> ProviderResult<KeyValueTags> {
        let properties = not_found_to_none(find_resource_by_id(&self.api, def.aws_type_name, identifier).await)?;
        let remote = KeyValueTags::from_cloudformation(
            properties
                .as_ref()
                .and_then(|p| p.get(TAGS_PROPERTY))
                .unwrap_or(&Json::Null),
        )
        .ignore_system();
        let managed = remote.clone().ignore(&self.ignore_tags);
        Ok(remote.removed(&managed))
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn is_already_gone(err: &ProviderError) -> bool {
    matches!(err.code(), Some(RESOURCE_NOT_FOUND) | Some(HANDLER_NOT_FOUND))
}

/// Write-only values are never read back; keep what was sent
fn carry_write_only(
    def: &ResourceDefinition,
    desired: &HashMap<String, Value>,
    attributes: &mut HashMap<String, Value>,
) {
    for attr in def.schema.attributes.values().filter(|a| a.write_only) {
        if let Some(value) = desired.get(&attr.name) {
            attributes.insert(attr.name.clone(), value.clone());
        }
    }
}
