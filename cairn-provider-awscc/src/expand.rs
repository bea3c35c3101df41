//! Expand - configuration values to Cloud Control properties
//!
//! Attribute names map through the schema's provider names. Values follow
//! the attribute type: JSON documents are sent as objects, namespaced enum
//! values lose their prefix, and structs recurse with their own field names.

use std::collections::HashMap;

use cairn_core::provider::ProviderError;
use cairn_core::resource::Value;
use cairn_core::schema::{AttributeType, ResourceSchema, normalize_namespaced_enum};
use heck::ToUpperCamelCase;
use serde_json::{Map, Value as Json};
use thiserror::Error;

use crate::schemas::TAGS_ATTRIBUTE;
use crate::utils::provider_name;

/// Value that cannot be expressed as a Cloud Control property
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("attribute '{attribute}' still refers to {binding}.{target}")]
    UnresolvedReference {
        attribute: String,
        binding: String,
        target: String,
    },

    #[error("attribute '{attribute}' is not a valid JSON document: {source}")]
    InvalidJson {
        attribute: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<MappingError> for ProviderError {
    fn from(err: MappingError) -> Self {
        ProviderError::validation(err.to_string()).with_cause(err)
    }
}

/// Properties for every attribute in `attributes` except tags
pub fn expand_attributes(
    schema: &ResourceSchema,
    attributes: &HashMap<String, Value>,
) -> Result<Map<String, Json>, MappingError> {
    let mut properties = Map::new();
    for (name, value) in attributes {
        if name == TAGS_ATTRIBUTE {
            continue;
        }
        let (key, json) = expand_attribute(schema, name, value)?;
        properties.insert(key, json);
    }
    Ok(properties)
}

/// Property name and value for a single attribute
pub fn expand_attribute(
    schema: &ResourceSchema,
    name: &str,
    value: &Value,
) -> Result<(String, Json), MappingError> {
    match schema.attributes.get(name) {
        Some(attr) => Ok((provider_name(attr), expand_value(&attr.attr_type, value, name)?)),
        None => Ok((name.to_upper_camel_case(), expand_untyped(value, name)?)),
    }
}

fn expand_value(attr_type: &AttributeType, value: &Value, path: &str) -> Result<Json, MappingError> {
    match (attr_type, value) {
        (_, Value::ResourceRef(binding, target)) => Err(MappingError::UnresolvedReference {
            attribute: path.to_string(),
            binding: binding.clone(),
            target: target.clone(),
        }),
        (t, Value::String(s)) if t.is_json_document() => {
            serde_json::from_str(s).map_err(|source| MappingError::InvalidJson {
                attribute: path.to_string(),
                source,
            })
        }
        (AttributeType::Custom { base, .. }, v) => expand_value(base, v, path),
        (AttributeType::Enum(variants), Value::String(s)) => {
            Ok(Json::String(normalize_namespaced_enum(s, variants)))
        }
        (AttributeType::List(inner), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| expand_value(inner, item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, MappingError>>()
            .map(Json::Array),
        (AttributeType::Map(inner), Value::Map(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), expand_value(inner, v, &format!("{}.{}", path, k))?)))
            .collect::<Result<Map<_, _>, MappingError>>()
            .map(Json::Object),
        (AttributeType::Struct { fields, .. }, Value::Map(map)) => {
            let mut object = Map::new();
            for (k, v) in map {
                let field_path = format!("{}.{}", path, k);
                match fields.iter().find(|f| &f.name == k) {
                    Some(field) => {
                        object.insert(provider_name(field), expand_value(&field.attr_type, v, &field_path)?);
                    }
                    None => {
                        object.insert(k.to_upper_camel_case(), expand_untyped(v, &field_path)?);
                    }
                }
            }
            Ok(Json::Object(object))
        }
        (_, v) => expand_untyped(v, path),
    }
}

fn expand_untyped(value: &Value, path: &str) -> Result<Json, MappingError> {
    match value.unresolved() {
        Some((binding, target)) => Err(MappingError::UnresolvedReference {
            attribute: path.to_string(),
            binding: binding.to_string(),
            target: target.to_string(),
        }),
        None => Ok(value.to_json()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{ec2_security_group, ec2_vpc, iam_role};
    use serde_json::json;

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn expands_names_and_enum_values() {
        let schema = ec2_vpc::definition().schema;
        let attrs: HashMap<String, Value> = [
            ("cidr_block".to_string(), string("10.0.0.0/16")),
            ("instance_tenancy".to_string(), string("InstanceTenancy.dedicated")),
            ("enable_dns_hostnames".to_string(), Value::Bool(true)),
            ("tags".to_string(), Value::Map(HashMap::new())),
        ]
        .into_iter()
        .collect();

        let props = expand_attributes(&schema, &attrs).unwrap();
        assert_eq!(
            Json::Object(props),
            json!({
                "CidrBlock": "10.0.0.0/16",
                "InstanceTenancy": "dedicated",
                "EnableDnsHostnames": true,
            })
        );
    }

    #[test]
    fn expands_struct_lists() {
        let schema = ec2_security_group::definition().schema;
        let rule: HashMap<String, Value> = [
            ("ip_protocol".to_string(), string("tcp")),
            ("from_port".to_string(), Value::Int(443)),
            ("to_port".to_string(), Value::Int(443)),
            ("cidr_ip".to_string(), string("0.0.0.0/0")),
        ]
        .into_iter()
        .collect();

        let (key, json) = expand_attribute(
            &schema,
            "security_group_ingress",
            &Value::List(vec![Value::Map(rule)]),
        )
        .unwrap();
        assert_eq!(key, "SecurityGroupIngress");
        assert_eq!(
            json,
            json!([{"IpProtocol": "tcp", "FromPort": 443, "ToPort": 443, "CidrIp": "0.0.0.0/0"}])
        );
    }

    #[test]
    fn json_documents_are_sent_as_objects() {
        let schema = iam_role::definition().schema;
        let (key, json) = expand_attribute(
            &schema,
            "assume_role_policy_document",
            &string(r#"{"Version": "2012-10-17", "Statement": []}"#),
        )
        .unwrap();
        assert_eq!(key, "AssumeRolePolicyDocument");
        assert_eq!(json, json!({"Version": "2012-10-17", "Statement": []}));

        let err = expand_attribute(&schema, "assume_role_policy_document", &string("{oops")).unwrap_err();
        assert!(matches!(err, MappingError::InvalidJson { .. }));
    }

    #[test]
    fn references_are_rejected() {
        let schema = ec2_security_group::definition().schema;
        let err = expand_attribute(
            &schema,
            "vpc_id",
            &Value::ResourceRef("main".to_string(), "id".to_string()),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "attribute 'vpc_id' still refers to main.id");

        let provider_err = ProviderError::from(err);
        assert_eq!(provider_err.kind, cairn_core::provider::ErrorKind::Validation);
    }
}
