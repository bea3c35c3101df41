//! lambda_function (AWS::Lambda::Function)

use std::time::Duration;

use cairn_core::retry::RetryableError;
use cairn_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{lambda_function_name, tags_attribute};
use crate::resources::{Lifecycle, ResourceDefinition};

const RUNTIMES: &[&str] = &[
    "nodejs20.x",
    "nodejs22.x",
    "python3.11",
    "python3.12",
    "python3.13",
    "java21",
    "dotnet8",
    "ruby3.3",
    "provided.al2023",
];

// Messages Lambda returns while a freshly created role or its grants propagate
const PROPAGATION_MESSAGES: &[&str] = &[
    "The role defined for the function cannot be assumed by Lambda",
    "The provided execution role does not have permissions",
    "throttled by EC2",
    "Lambda was unable to configure access to your environment variables because the KMS key is invalid for CreateGrant",
];

fn code() -> AttributeType {
    AttributeType::Struct {
        name: "Code".to_string(),
        fields: vec![
            AttributeSchema::new("zip_file", AttributeType::String)
                .optional()
                .with_description("Inline source, for interpreted runtimes."),
            AttributeSchema::new("s3_bucket", AttributeType::String)
                .optional()
                .with_description("Bucket holding the deployment package."),
            AttributeSchema::new("s3_key", AttributeType::String)
                .optional()
                .with_description("Key of the deployment package."),
            AttributeSchema::new("image_uri", AttributeType::String)
                .optional()
                .with_description("Container image for the function."),
        ],
    }
}

fn environment() -> AttributeType {
    AttributeType::Struct {
        name: "Environment".to_string(),
        fields: vec![
            AttributeSchema::new("variables", AttributeType::Map(Box::new(AttributeType::String)))
                .optional()
                .with_description("Environment variables visible to the function."),
        ],
    }
}

pub fn definition() -> ResourceDefinition {
    let lifecycle = PROPAGATION_MESSAGES.iter().fold(
        Lifecycle::default().with_create_timeout(Duration::from_secs(10 * 60)),
        |lifecycle, message| lifecycle.with_retryable(RetryableError::message(*message)),
    );

    ResourceDefinition {
        resource_type: "lambda_function",
        aws_type_name: "AWS::Lambda::Function",
        schema: ResourceSchema::new("lambda_function")
            .with_description("A Lambda function.")
            .attribute(
                AttributeSchema::new("function_name", lambda_function_name())
                    .optional()
                    .computed()
                    .force_new()
                    .with_description("Name of the function. Generated when omitted."),
            )
            .attribute(
                AttributeSchema::new("role", AttributeType::String)
                    .required()
                    .with_description("ARN of the function's execution role."),
            )
            .attribute(
                AttributeSchema::new(
                    "runtime",
                    AttributeType::Enum(RUNTIMES.iter().map(|r| r.to_string()).collect()),
                )
                .optional()
                .with_description("The runtime environment for the function."),
            )
            .attribute(
                AttributeSchema::new("handler", AttributeType::String)
                    .optional()
                    .with_description("The method in the code that processes events."),
            )
            .attribute(
                AttributeSchema::new("code", code())
                    .required()
                    .write_only()
                    .with_description("The deployment package. Not returned by reads."),
            )
            .attribute(
                AttributeSchema::new("timeout", types::positive_int())
                    .optional()
                    .computed()
                    .with_description("Seconds the function may run before it is stopped."),
            )
            .attribute(
                AttributeSchema::new("memory_size", types::positive_int())
                    .optional()
                    .computed()
                    .with_description("Memory available to the function, in MB."),
            )
            .attribute(
                AttributeSchema::new("environment", environment())
                    .optional()
                    .with_description("Environment variables set for the function."),
            )
            .attribute(
                AttributeSchema::new("arn", AttributeType::String)
                    .computed()
                    .with_description("The ARN of the function."),
            )
            .attribute(tags_attribute()),
        has_tags: true,
        updatable: true,
        identifier_attribute: Some("function_name"),
        lifecycle,
    }
}
