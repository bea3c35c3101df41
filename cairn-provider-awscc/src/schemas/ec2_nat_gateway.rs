//! ec2_nat_gateway (AWS::EC2::NatGateway)

use std::time::Duration;

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_nat_gateway",
        aws_type_name: "AWS::EC2::NatGateway",
        schema: ResourceSchema::new("ec2_nat_gateway")
            .with_description("A NAT gateway in a subnet.")
            .attribute(
                AttributeSchema::new("subnet_id", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("The ID of the subnet the NAT gateway is in."),
            )
            .attribute(
                AttributeSchema::new("allocation_id", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("The allocation ID of the Elastic IP address for a public NAT gateway."),
            )
            .attribute(
                AttributeSchema::new(
                    "connectivity_type",
                    AttributeType::Enum(vec!["public".to_string(), "private".to_string()]),
                )
                .optional()
                .computed()
                .force_new()
                .with_description("Whether the NAT gateway supports public or private connectivity."),
            )
            .attribute(
                AttributeSchema::new("nat_gateway_id", AttributeType::String)
                    .computed()
                    .with_description("The ID of the NAT gateway."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("nat_gateway_id"),
        lifecycle: Lifecycle::default()
            .with_create_timeout(Duration::from_secs(10 * 60))
            .with_delete_timeout(Duration::from_secs(30 * 60))
            .with_delete_delay(Duration::from_secs(10))
            .with_min_poll(Duration::from_secs(10)),
    }
}
