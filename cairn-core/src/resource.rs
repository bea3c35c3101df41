//! Resource - Representing resources and their state

use std::collections::HashMap;

use crate::timeouts::Timeouts;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g., "ec2_vpc", "iam_role")
    pub resource_type: String,
    /// Resource name (binding name in the configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parse an address of the form `type.name`
    pub fn parse_address(address: &str) -> Option<Self> {
        let (resource_type, name) = address.split_once('.')?;
        if resource_type.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(resource_type, name))
    }

    /// Address of the form `type.name`
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding_name, attribute_name)
    ResourceRef(String, String),
}

impl Value {
    /// Convert a configuration or state JSON value.
    ///
    /// Strings of the form `${binding.attribute}` become references.
    /// Floats are truncated, nulls are dropped.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::String(s) => {
                Some(parse_reference(s).unwrap_or_else(|| Value::String(s.clone())))
            }
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::Int),
            serde_json::Value::Array(items) => Some(Value::List(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Map(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            serde_json::Value::Null => None,
        }
    }

    /// Convert to JSON for persistence. References are written back as `${binding.attribute}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::ResourceRef(binding, attr) => {
                serde_json::Value::String(format!("${{{}.{}}}", binding, attr))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Replace references with the values they point to, where known
    pub fn resolve(&self, bindings: &Bindings) -> Value {
        match self {
            Value::ResourceRef(binding, attr) => bindings
                .get(binding)
                .and_then(|attrs| attrs.get(attr))
                .map(|v| v.resolve(bindings))
                .unwrap_or_else(|| self.clone()),
            Value::List(items) => Value::List(items.iter().map(|v| v.resolve(bindings)).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.resolve(bindings)))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// First reference left in this value, if any
    pub fn unresolved(&self) -> Option<(&str, &str)> {
        match self {
            Value::ResourceRef(binding, attr) => Some((binding.as_str(), attr.as_str())),
            Value::List(items) => items.iter().find_map(Value::unresolved),
            Value::Map(map) => map.values().find_map(Value::unresolved),
            _ => None,
        }
    }

    /// Collect the binding names this value refers to
    pub fn references(&self, out: &mut Vec<String>) {
        match self {
            Value::ResourceRef(binding, _) => out.push(binding.clone()),
            Value::List(items) => items.iter().for_each(|v| v.references(out)),
            Value::Map(map) => map.values().for_each(|v| v.references(out)),
            _ => {}
        }
    }
}

/// Known attribute values per binding name, used to resolve references.
/// The provider-side identifier is available as the `id` attribute.
pub type Bindings = HashMap<String, HashMap<String, Value>>;

fn parse_reference(s: &str) -> Option<Value> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (binding, attr) = inner.split_once('.')?;
    if binding.is_empty() || attr.is_empty() {
        return None;
    }
    Some(Value::ResourceRef(binding.to_string(), attr.to_string()))
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// Per-operation timeout overrides
    pub timeouts: Timeouts,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Binding names of other resources this resource refers to
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps = Vec::new();
        for value in self.attributes.values() {
            value.references(&mut deps);
        }
        deps.sort();
        deps.dedup();
        deps
    }

    /// Copy of this resource with references resolved against `bindings`
    pub fn resolve(&self, bindings: &Bindings) -> Resource {
        Resource {
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.resolve(bindings)))
                .collect(),
            ..self.clone()
        }
    }

    /// First attribute still holding a reference, as `(attribute, binding, attr)`
    pub fn unresolved(&self) -> Option<(&str, &str, &str)> {
        let mut keys: Vec<&String> = self.attributes.keys().collect();
        keys.sort();
        keys.into_iter().find_map(|k| {
            self.attributes[k]
                .unresolved()
                .map(|(binding, attr)| (k.as_str(), binding, attr))
        })
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider-side identifier (e.g., vpc-xxx, an IAM role name)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Attributes exposed to references, including `id`
    pub fn binding_attributes(&self) -> HashMap<String, Value> {
        let mut attrs = self.attributes.clone();
        if let Some(ref identifier) = self.identifier {
            attrs.insert("id".to_string(), Value::String(identifier.clone()));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_address() {
        let id = ResourceId::parse_address("ec2_vpc.main").unwrap();
        assert_eq!(id, ResourceId::new("ec2_vpc", "main"));
        assert!(ResourceId::parse_address("ec2_vpc").is_none());
        assert!(ResourceId::parse_address(".main").is_none());
    }

    #[test]
    fn json_strings_with_reference_syntax_become_refs() {
        let value = Value::from_json(&json!("${main.vpc_id}")).unwrap();
        assert_eq!(
            value,
            Value::ResourceRef("main".to_string(), "vpc_id".to_string())
        );
        assert_eq!(value.to_json(), json!("${main.vpc_id}"));

        let plain = Value::from_json(&json!("${not a ref")).unwrap();
        assert_eq!(plain, Value::String("${not a ref".to_string()));
    }

    #[test]
    fn json_nulls_are_dropped() {
        let value = Value::from_json(&json!({"a": null, "b": 1})).unwrap();
        match value {
            Value::Map(map) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get("b"), Some(&Value::Int(1)));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn dependencies_are_collected_from_nested_values() {
        let resource = Resource::new("ec2_route", "default")
            .with_attribute(
                "route_table_id",
                Value::ResourceRef("public".to_string(), "route_table_id".to_string()),
            )
            .with_attribute(
                "targets",
                Value::List(vec![
                    Value::ResourceRef("igw".to_string(), "internet_gateway_id".to_string()),
                    Value::ResourceRef("public".to_string(), "route_table_id".to_string()),
                ]),
            );

        assert_eq!(resource.dependencies(), vec!["igw", "public"]);
    }

    #[test]
    fn resolve_follows_bindings_and_keeps_unknown_refs() {
        let vpc = State::existing(ResourceId::new("ec2_vpc", "main"), HashMap::new())
            .with_identifier("vpc-0abc");
        let mut bindings = Bindings::new();
        bindings.insert("main".to_string(), vpc.binding_attributes());

        let subnet = Resource::new("ec2_subnet", "a")
            .with_attribute(
                "vpc_id",
                Value::ResourceRef("main".to_string(), "id".to_string()),
            )
            .with_attribute(
                "route_table_id",
                Value::ResourceRef("rt".to_string(), "id".to_string()),
            );

        let resolved = subnet.resolve(&bindings);
        assert_eq!(
            resolved.attributes.get("vpc_id"),
            Some(&Value::String("vpc-0abc".to_string()))
        );
        assert_eq!(resolved.unresolved(), Some(("route_table_id", "rt", "id")));
    }
}
