//! Resource definitions for AWS Cloud Control
//!
//! A [`ResourceDefinition`] ties a resource type to its CloudFormation type
//! name, its schema, and the [`Lifecycle`] knobs its handlers need: default
//! timeouts, how long to wait for eventual consistency, and which errors are
//! worth retrying.

use std::time::Duration;

use cairn_core::provider::ProviderError;
use cairn_core::retry::RetryableError;
use cairn_core::schema::ResourceSchema;
use cairn_core::timeouts::{Operation, Timeouts};
use cairn_core::waiter::DEFAULT_NOT_FOUND_CHECKS;

/// Handler error codes every resource retries
pub const RETRYABLE_HANDLER_CODES: &[&str] = &["Throttling", "ResourceConflict", "NetworkFailure"];

/// Per-resource lifecycle settings
#[derive(Debug, Clone)]
pub struct Lifecycle {
    pub create_timeout: Duration,
    pub read_timeout: Duration,
    pub update_timeout: Duration,
    pub delete_timeout: Duration,
    /// Consecutive successful reads required after create
    pub created_occurrence: u32,
    /// Consecutive "not found" reads required after delete
    pub deleted_occurrence: u32,
    /// "Not found" reads tolerated while waiting for a new resource to appear
    pub not_found_checks: u32,
    /// Wait before the first read after delete
    pub delete_delay: Duration,
    /// Lower bound between reads while waiting
    pub min_poll: Duration,
    /// Errors retried on top of [`RETRYABLE_HANDLER_CODES`]
    pub retryable: Vec<RetryableError>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(20 * 60),
            read_timeout: Duration::from_secs(5 * 60),
            update_timeout: Duration::from_secs(20 * 60),
            delete_timeout: Duration::from_secs(20 * 60),
            created_occurrence: 1,
            deleted_occurrence: 1,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            delete_delay: Duration::ZERO,
            min_poll: Duration::from_secs(1),
            retryable: Vec::new(),
        }
    }
}

impl Lifecycle {
    /// Timeout for `op`: the configured override, else this lifecycle's default
    pub fn timeout(&self, op: Operation, overrides: &Timeouts) -> Duration {
        let default = match op {
            Operation::Create => self.create_timeout,
            Operation::Read => self.read_timeout,
            Operation::Update => self.update_timeout,
            Operation::Delete => self.delete_timeout,
        };
        overrides.resolve(op, default)
    }

    pub fn is_retryable(&self, err: &ProviderError) -> bool {
        err.code()
            .is_some_and(|code| RETRYABLE_HANDLER_CODES.contains(&code))
            || self.retryable.iter().any(|p| p.matches(err))
    }

    pub fn with_created_occurrence(mut self, occurrence: u32) -> Self {
        self.created_occurrence = occurrence;
        self
    }

    pub fn with_deleted_occurrence(mut self, occurrence: u32) -> Self {
        self.deleted_occurrence = occurrence;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub fn with_min_poll(mut self, min_poll: Duration) -> Self {
        self.min_poll = min_poll;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }

    pub fn with_retryable(mut self, pattern: RetryableError) -> Self {
        self.retryable.push(pattern);
        self
    }
}

/// A resource type managed through Cloud Control
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Type name used in configuration (e.g., "ec2_vpc")
    pub resource_type: &'static str,
    /// CloudFormation type name (e.g., "AWS::EC2::VPC")
    pub aws_type_name: &'static str,
    pub schema: ResourceSchema,
    /// Whether the type carries a `Tags` property
    pub has_tags: bool,
    /// Whether any attribute can change in place
    pub updatable: bool,
    /// Computed attribute holding the primary identifier, when the identifier
    /// is a single property
    pub identifier_attribute: Option<&'static str>,
    pub lifecycle: Lifecycle,
}
