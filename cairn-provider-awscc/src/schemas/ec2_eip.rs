//! ec2_eip (AWS::EC2::EIP)

use cairn_core::resource::Value;
use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_eip",
        aws_type_name: "AWS::EC2::EIP",
        schema: ResourceSchema::new("ec2_eip")
            .with_description("An Elastic IP address.")
            .attribute(
                AttributeSchema::new(
                    "domain",
                    AttributeType::Enum(vec!["vpc".to_string(), "standard".to_string()]),
                )
                .optional()
                .force_new()
                .with_default(Value::String("vpc".to_string()))
                .with_description("Whether the address is for use in a VPC."),
            )
            .attribute(
                AttributeSchema::new("allocation_id", AttributeType::String)
                    .computed()
                    .with_description("The allocation ID of the address."),
            )
            .attribute(
                AttributeSchema::new("public_ip", AttributeType::String)
                    .computed()
                    .with_description("The Elastic IP address."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: None,
        lifecycle: Lifecycle::default(),
    }
}
