//! ec2_subnet (AWS::EC2::Subnet)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_subnet",
        aws_type_name: "AWS::EC2::Subnet",
        schema: ResourceSchema::new("ec2_subnet")
            .with_description("A subnet in a VPC.")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("The ID of the VPC the subnet is in."),
            )
            .attribute(
                AttributeSchema::new("cidr_block", types::cidr())
                    .required()
                    .force_new()
                    .with_description("The IPv4 CIDR block assigned to the subnet."),
            )
            .attribute(
                AttributeSchema::new("availability_zone", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .with_description("The Availability Zone of the subnet."),
            )
            .attribute(
                AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                    .optional()
                    .computed()
                    .with_description("Whether instances launched in the subnet get a public IPv4 address."),
            )
            .attribute(
                AttributeSchema::new("subnet_id", AttributeType::String)
                    .computed()
                    .with_description("The ID of the subnet."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("subnet_id"),
        lifecycle: Lifecycle::default(),
    }
}
