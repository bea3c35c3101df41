//! Flatten - Cloud Control properties to state values
//!
//! The inverse of [`crate::expand`]. Only attributes in the schema are read
//! back; write-only attributes and tags are left to the caller.

use std::collections::HashMap;

use cairn_core::resource::Value;
use cairn_core::schema::{AttributeType, ResourceSchema};
use serde_json::Value as Json;

use crate::schemas::TAGS_ATTRIBUTE;
use crate::utils::provider_name;

pub fn flatten_properties(schema: &ResourceSchema, properties: &Json) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    for attr in schema.attributes.values() {
        if attr.write_only || attr.name == TAGS_ATTRIBUTE {
            continue;
        }
        if let Some(value) = properties
            .get(provider_name(attr))
            .and_then(|json| flatten_value(&attr.attr_type, json))
        {
            attributes.insert(attr.name.clone(), value);
        }
    }
    attributes
}

fn flatten_value(attr_type: &AttributeType, json: &Json) -> Option<Value> {
    match (attr_type, json) {
        (_, Json::Null) => None,
        (t, Json::String(s)) if t.is_json_document() => {
            Some(Value::String(match serde_json::from_str::<Json>(s) {
                Ok(doc) => doc.to_string(),
                Err(_) => s.clone(),
            }))
        }
        (t, doc) if t.is_json_document() => Some(Value::String(doc.to_string())),
        (AttributeType::Custom { base, .. }, j) => flatten_value(base, j),
        (AttributeType::Int, Json::String(s)) => s.parse().ok().map(Value::Int),
        (AttributeType::Bool, Json::String(s)) => s.parse().ok().map(Value::Bool),
        (AttributeType::String, Json::Number(n)) => Some(Value::String(n.to_string())),
        (AttributeType::List(inner), Json::Array(items)) => Some(Value::List(
            items.iter().filter_map(|item| flatten_value(inner, item)).collect(),
        )),
        (AttributeType::Map(inner), Json::Object(map)) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| flatten_value(inner, v).map(|v| (k.clone(), v)))
                .collect(),
        )),
        (AttributeType::Struct { fields, .. }, Json::Object(map)) => Some(Value::Map(
            fields
                .iter()
                .filter_map(|field| {
                    let value = flatten_value(&field.attr_type, map.get(&provider_name(field))?)?;
                    Some((field.name.clone(), value))
                })
                .collect(),
        )),
        (_, j) => flatten_untyped(j),
    }
}

// Strings are kept verbatim: remote values never carry references
fn flatten_untyped(json: &Json) -> Option<Value> {
    match json {
        Json::Null => None,
        Json::String(s) => Some(Value::String(s.clone())),
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Value::Int),
        Json::Array(items) => Some(Value::List(items.iter().filter_map(flatten_untyped).collect())),
        Json::Object(map) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| flatten_untyped(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}
