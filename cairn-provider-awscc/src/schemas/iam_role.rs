//! iam_role (AWS::IAM::Role)

use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{iam_name, tags_attribute};
use crate::resources::{Lifecycle, ResourceDefinition};

pub fn definition() -> ResourceDefinition {
    ResourceDefinition {
        resource_type: "iam_role",
        aws_type_name: "AWS::IAM::Role",
        schema: ResourceSchema::new("iam_role")
            .with_description("An IAM role.")
            .attribute(
                AttributeSchema::new("role_name", iam_name())
                    .optional()
                    .computed()
                    .force_new()
                    .with_description("Name of the role. Generated when omitted."),
            )
            .attribute(
                AttributeSchema::new("assume_role_policy_document", types::json_document())
                    .required()
                    .with_description("The trust policy associated with the role."),
            )
            .attribute(
                AttributeSchema::new("description", AttributeType::String)
                    .optional()
                    .with_description("A description of the role."),
            )
            .attribute(
                AttributeSchema::new("max_session_duration", types::positive_int())
                    .optional()
                    .computed()
                    .with_description("Maximum session duration in seconds."),
            )
            .attribute(
                AttributeSchema::new("path", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .with_description("Path to the role."),
            )
            .attribute(
                AttributeSchema::new(
                    "managed_policy_arns",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .optional()
                .with_description("ARNs of managed policies attached to the role."),
            )
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_description("The ARN of the role."),
            )
            .attribute(
                AttributeSchema::new("role_id", AttributeType::String)
                    .computed()
                    .with_description("The stable and unique ID of the role."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("role_name"),
        lifecycle: Lifecycle::default(),
    }
}
