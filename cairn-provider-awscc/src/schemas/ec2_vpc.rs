//! ec2_vpc (AWS::EC2::VPC)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_vpc",
        aws_type_name: "AWS::EC2::VPC",
        schema: ResourceSchema::new("ec2_vpc")
            .with_description("A virtual private cloud.")
            .attribute(
                AttributeSchema::new("cidr_block", types::cidr())
                    .required()
                    .force_new()
                    .with_description("The primary IPv4 CIDR block for the VPC."),
            )
            .attribute(
                AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                    .optional()
                    .computed()
                    .with_description("Whether instances launched in the VPC get DNS hostnames."),
            )
            .attribute(
                AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                    .optional()
                    .computed()
                    .with_description("Whether DNS resolution is supported for the VPC."),
            )
            .attribute(
                AttributeSchema::new(
                    "instance_tenancy",
                    AttributeType::Enum(vec![
                        "default".to_string(),
                        "dedicated".to_string(),
                        "host".to_string(),
                    ]),
                )
                .optional()
                .computed()
                .with_description("The allowed tenancy of instances launched into the VPC."),
            )
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .computed()
                    .with_description("The ID of the VPC."),
            )
            .attribute(
                AttributeSchema::new("default_security_group", AttributeType::String)
                    .computed()
                    .with_description("The ID of the security group created with the VPC."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("vpc_id"),
        lifecycle: Lifecycle::default(),
    }
}
