//! Utility functions for name mapping and value normalization

use std::sync::LazyLock;

use cairn_core::schema::AttributeSchema;
use heck::ToUpperCamelCase;
use regex::Regex;

static REGION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]*)?-[a-z]+-\d+$").unwrap());

/// Cloud Control property name of an attribute (e.g., "cidr_block" -> "CidrBlock")
pub fn provider_name(attr: &AttributeSchema) -> String {
    match attr.provider_name {
        Some(ref name) => name.clone(),
        None => attr.name.to_upper_camel_case(),
    }
}

/// Normalize region value (e.g., "aws.Region.ap_northeast_1" -> "ap-northeast-1")
pub fn normalize_region(s: &str) -> String {
    let region_part = s.rsplit('.').next().unwrap_or(s);
    region_part.replace('_', "-")
}

/// Whether `s` looks like an AWS region name after normalization
pub fn is_valid_region(s: &str) -> bool {
    REGION_PATTERN.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::schema::AttributeType;

    #[test]
    fn test_provider_name() {
        let plain = AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool);
        assert_eq!(provider_name(&plain), "EnableDnsHostnames");

        let s3 = AttributeSchema::new("s3_bucket", AttributeType::String);
        assert_eq!(provider_name(&s3), "S3Bucket");

        let renamed = AttributeSchema::new("security_group_id", AttributeType::String)
            .with_provider_name("Id");
        assert_eq!(provider_name(&renamed), "Id");
    }

    #[test]
    fn test_normalize_region() {
        assert_eq!(normalize_region("ap_northeast_1"), "ap-northeast-1");
        assert_eq!(normalize_region("aws.Region.us_east_1"), "us-east-1");
        assert_eq!(normalize_region("eu-west-1"), "eu-west-1");
    }

    #[test]
    fn test_is_valid_region() {
        assert!(is_valid_region("us-east-1"));
        assert!(is_valid_region("us-gov-west-1"));
        assert!(is_valid_region("ap-southeast-4"));
        assert!(!is_valid_region("us-east"));
        assert!(!is_valid_region("US-EAST-1"));
    }
}
