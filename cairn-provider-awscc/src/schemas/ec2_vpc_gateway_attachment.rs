//! ec2_vpc_gateway_attachment (AWS::EC2::VPCGatewayAttachment)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_vpc_gateway_attachment",
        aws_type_name: "AWS::EC2::VPCGatewayAttachment",
        schema: ResourceSchema::new("ec2_vpc_gateway_attachment")
            .with_description("Attaches an internet gateway or a virtual private gateway to a VPC.")
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("The ID of the VPC."),
            )
            .attribute(
                AttributeSchema::new("internet_gateway_id", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("The ID of the internet gateway to attach."),
            )
            .attribute(
                AttributeSchema::new("vpn_gateway_id", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("The ID of the virtual private gateway to attach."),
            ),
        has_tags: false,
        updatable: false,
        identifier_attribute: None,
        lifecycle: Lifecycle::default(),
    }
}
