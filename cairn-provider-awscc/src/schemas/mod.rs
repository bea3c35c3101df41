//! Resource definitions, one module per Cloud Control type

pub mod ec2_eip;
pub mod ec2_internet_gateway;
pub mod ec2_nat_gateway;
pub mod ec2_route;
pub mod ec2_route_table;
pub mod ec2_security_group;
pub mod ec2_subnet;
pub mod ec2_vpc;
pub mod ec2_vpc_gateway_attachment;
pub mod iam_role;
pub mod lambda_function;

use std::sync::LazyLock;

use cairn_core::resource::Value;
use cairn_core::schema::{AttributeSchema, AttributeType, types};
use regex::Regex;

use crate::resources::ResourceDefinition;

/// Attribute holding a resource's tags
pub const TAGS_ATTRIBUTE: &str = "tags";

static IAM_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w+=,.@-]{1,64}$").unwrap());
static LAMBDA_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap());

/// Every resource definition of this provider
pub fn definitions() -> Vec<ResourceDefinition> {
    vec![
        ec2_vpc::definition(),
        ec2_subnet::definition(),
        ec2_internet_gateway::definition(),
        ec2_vpc_gateway_attachment::definition(),
        ec2_route_table::definition(),
        ec2_route::definition(),
        ec2_eip::definition(),
        ec2_nat_gateway::definition(),
        ec2_security_group::definition(),
        iam_role::definition(),
        lambda_function::definition(),
    ]
}

/// Optional `tags` map, sent as a CloudFormation `Tags` array
pub fn tags_attribute() -> AttributeSchema {
    AttributeSchema::new(TAGS_ATTRIBUTE, types::tags())
        .optional()
        .with_description("Key-value tags, merged over the provider's default tags.")
}

fn matches_pattern(value: &Value, pattern: &Regex, what: &str) -> Result<(), String> {
    match value {
        Value::String(s) if pattern.is_match(s) => Ok(()),
        Value::String(s) => Err(format!("'{}' is not a valid {}", s, what)),
        _ => Err("Expected string".to_string()),
    }
}

/// IAM entity name: up to 64 of alphanumerics and `+=,.@_-`
pub fn iam_name() -> AttributeType {
    AttributeType::Custom {
        name: "IamName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| matches_pattern(value, &IAM_NAME_PATTERN, "IAM name"),
    }
}

/// Lambda function name: up to 64 of alphanumerics, `-` and `_`
pub fn lambda_function_name() -> AttributeType {
    AttributeType::Custom {
        name: "FunctionName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| matches_pattern(value, &LAMBDA_NAME_PATTERN, "function name"),
    }
}
