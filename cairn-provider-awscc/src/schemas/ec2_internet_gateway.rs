//! ec2_internet_gateway (AWS::EC2::InternetGateway)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_internet_gateway",
        aws_type_name: "AWS::EC2::InternetGateway",
        schema: ResourceSchema::new("ec2_internet_gateway")
            .with_description("An internet gateway, attached to a VPC with ec2_vpc_gateway_attachment.")
            .attribute(
                AttributeSchema::new("internet_gateway_id", AttributeType::String)
                    .computed()
                    .with_description("The ID of the internet gateway."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("internet_gateway_id"),
        lifecycle: Lifecycle::default().with_not_found_checks(1000),
    }
}
