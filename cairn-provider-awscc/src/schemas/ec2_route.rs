//! ec2_route (AWS::EC2::Route)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_route",
        aws_type_name: "AWS::EC2::Route",
        schema: ResourceSchema::new("ec2_route")
            .with_description("A route in a route table.")
            .attribute(
                AttributeSchema::new("route_table_id", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("The ID of the route table."),
            )
            .attribute(
                AttributeSchema::new("destination_cidr_block", types::cidr())
                    .required()
                    .force_new()
                    .with_description("The IPv4 CIDR block used for destination matches."),
            )
            .attribute(
                AttributeSchema::new("gateway_id", AttributeType::String)
                    .optional()
                    .with_description("The ID of an internet gateway or virtual private gateway."),
            )
            .attribute(
                AttributeSchema::new("nat_gateway_id", AttributeType::String)
                    .optional()
                    .with_description("The ID of a NAT gateway."),
            ),
        has_tags: false,
        updatable: true,
        identifier_attribute: None,
        lifecycle: Lifecycle::default().with_not_found_checks(1000),
    }
}
