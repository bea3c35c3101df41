//! ec2_security_group (AWS::EC2::SecurityGroup)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::tags_attribute;
use crate::resources::{Lifecycle, ResourceDefinition};

fn rule(name: &str) -> AttributeType {
    AttributeType::Struct {
        name: name.to_string(),
        fields: vec![
            AttributeSchema::new("ip_protocol", AttributeType::String)
                .required()
                .with_description("Protocol name or number; -1 means all."),
            AttributeSchema::new("from_port", types::port())
                .optional()
                .with_description("Start of the port range."),
            AttributeSchema::new("to_port", types::port())
                .optional()
                .with_description("End of the port range."),
            AttributeSchema::new("cidr_ip", types::cidr())
                .optional()
                .with_description("IPv4 range the rule applies to."),
            AttributeSchema::new("description", AttributeType::String)
                .optional()
                .with_description("Description of the rule."),
        ],
    }
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "ec2_security_group",
        aws_type_name: "AWS::EC2::SecurityGroup",
        schema: ResourceSchema::new("ec2_security_group")
            .with_description("A security group with inline ingress and egress rules.")
            .attribute(
                AttributeSchema::new("group_description", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("A description of the security group."),
            )
            .attribute(
                AttributeSchema::new("group_name", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .with_description("The name of the security group."),
            )
            .attribute(
                AttributeSchema::new("vpc_id", AttributeType::String)
                    .optional()
                    .force_new()
                    .with_description("The ID of the VPC for the security group."),
            )
            .attribute(
                AttributeSchema::new(
                    "security_group_ingress",
                    AttributeType::List(Box::new(rule("Ingress"))),
                )
                .optional()
                .with_description("Inbound rules."),
            )
            .attribute(
                AttributeSchema::new(
                    "security_group_egress",
                    AttributeType::List(Box::new(rule("Egress"))),
                )
                .optional()
                .computed()
                .with_description("Outbound rules. Omitted means allow all."),
            )
            .attribute(
                AttributeSchema::new("group_id", AttributeType::String)
                    .computed()
                    .with_description("The group ID."),
            )
            .attribute(
                AttributeSchema::new("security_group_id", AttributeType::String)
                    .computed()
                    .with_provider_name("Id")
                    .with_description("The ID of the security group."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("security_group_id"),
        lifecycle: Lifecycle::default()
            .with_created_occurrence(3)
            .with_not_found_checks(1000),
    }
}
