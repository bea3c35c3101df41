//! ec2_route_table (AWS::EC2::RouteTable)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_route_table",
        aws_type_name: "AWS::EC2::RouteTable",
        schema: ResourceSchema::new("ec2_route_table")
            .with_description("A route table for a VPC.")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("The ID of the VPC."),
            )
            .attribute(
                AttributeSchema::new("route_table_id", AttributeType::String)
                    .computed()
                    .with_description("The ID of the route table."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("route_table_id"),
        // Route tables are eventually consistent: confirm twice either way
        lifecycle: Lifecycle::default()
            .with_created_occurrence(2)
            .with_deleted_occurrence(2)
            .with_not_found_checks(1000),
    }
}
