//! Status functions and waiters for Cloud Control operations
//!
//! Every mutating Cloud Control call is asynchronous: it returns a request
//! token whose status moves through `PENDING`/`IN_PROGRESS` to `SUCCESS` or
//! `FAILED`. On top of that, a resource reported created may not be readable
//! yet, and a deleted one may still be visible for a while; the existence
//! waiters cover that window.

use std::time::Duration;

use cairn_core::finder::not_found_to_none;
use cairn_core::provider::{ProviderError, ProviderResult};
use cairn_core::waiter::{Refreshed, StateChangeConf};

use crate::api::{
    CANCEL_IN_PROGRESS, CloudControlApi, FAILED, GENERAL_SERVICE_EXCEPTION, IN_PROGRESS, PENDING,
    ProgressEvent, SUCCESS,
};
use crate::finder::find_resource_by_id;
use crate::resources::ResourceDefinition;

/// Synthetic status of a resource that can be read
pub const EXISTS: &str = "exists";

const OPERATION_MIN_POLL: Duration = Duration::from_secs(1);

/// Current status of an operation. A failed operation is an API error
/// carrying the handler's error code.
pub async fn status_operation(
    api: &dyn CloudControlApi,
    request_token: &str,
) -> ProviderResult<Refreshed<ProgressEvent>> {
    let event = api.get_request_status(request_token).await?;

    if event.status == FAILED {
        let code = event
            .error_code
            .as_deref()
            .unwrap_or(GENERAL_SERVICE_EXCEPTION);
        let message = event.status_message.as_deref().unwrap_or("operation failed");
        return Err(ProviderError::api(code, message));
    }

    let status = event.status.clone();
    Ok(Some((event, status)))
}

/// Wait for an operation to succeed, returning its final event
pub async fn wait_operation_complete(
    api: &dyn CloudControlApi,
    request_token: &str,
    timeout: Duration,
) -> ProviderResult<ProgressEvent> {
    let conf = StateChangeConf::new([PENDING, IN_PROGRESS, CANCEL_IN_PROGRESS], [SUCCESS], timeout)
        .with_min_timeout(OPERATION_MIN_POLL);

    let event = conf
        .wait_for_state(|| status_operation(api, request_token))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!(
                "waiting for operation ({}) to complete",
                request_token
            ))
        })?;

    event.ok_or_else(|| {
        ProviderError::new(format!("operation ({}) reported no status", request_token))
    })
}

/// Read the resource, reporting it with the [`EXISTS`] status
pub async fn status_resource(
    api: &dyn CloudControlApi,
    type_name: &str,
    identifier: &str,
) -> ProviderResult<Refreshed<serde_json::Value>> {
    let found = not_found_to_none(find_resource_by_id(api, type_name, identifier).await)?;
    Ok(found.map(|properties| (properties, EXISTS.to_string())))
}

/// Wait until the resource has been read `created_occurrence` times in a row
pub async fn wait_resource_exists(
    api: &dyn CloudControlApi,
    definition: &ResourceDefinition,
    identifier: &str,
    timeout: Duration,
) -> ProviderResult<serde_json::Value> {
    let lifecycle = &definition.lifecycle;
    let conf = StateChangeConf::new(Vec::<String>::new(), [EXISTS], timeout)
        .with_min_timeout(lifecycle.min_poll)
        .with_not_found_checks(lifecycle.not_found_checks)
        .with_continuous_target_occurrence(lifecycle.created_occurrence);

    let properties = conf
        .wait_for_state(|| status_resource(api, definition.aws_type_name, identifier))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!(
                "waiting for {} ({}) to become available",
                definition.resource_type, identifier
            ))
        })?;

    properties.ok_or_else(|| {
        ProviderError::not_found(format!(
            "{} ({}) disappeared while waiting for it",
            definition.resource_type, identifier
        ))
    })
}

/// Wait until reads stop finding the resource
pub async fn wait_resource_deleted(
    api: &dyn CloudControlApi,
    definition: &ResourceDefinition,
    identifier: &str,
    timeout: Duration,
) -> ProviderResult<()> {
    let lifecycle = &definition.lifecycle;
    let conf = StateChangeConf::new([EXISTS], Vec::<String>::new(), timeout)
        .with_delay(lifecycle.delete_delay)
        .with_min_timeout(lifecycle.min_poll)
        .with_continuous_target_occurrence(lifecycle.deleted_occurrence);

    conf.wait_for_state(|| status_resource(api, definition.aws_type_name, identifier))
        .await
        .map_err(|e| {
            ProviderError::from(e).context(format!(
                "waiting for {} ({}) to be deleted",
                definition.resource_type, identifier
            ))
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCloudControl;
    use crate::schemas::ec2_route_table;
    use cairn_core::provider::ErrorKind;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn failed_operation_carries_handler_code() {
        let api = FakeCloudControl::new();
        api.fail_next_create("AlreadyExists", "rtb-1 already exists");
        let event = api.create_resource("AWS::EC2::RouteTable", &json!({})).await.unwrap();
        assert_eq!(event.status, IN_PROGRESS);

        let err = wait_operation_complete(&api, &event.request_token, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("AlreadyExists"));
        assert!(err.message.starts_with("waiting for operation (token-1) to complete"));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_operation_returns_identifier() {
        let api = FakeCloudControl::new();
        let event = api
            .create_resource("AWS::EC2::RouteTable", &json!({"VpcId": "vpc-1"}))
            .await
            .unwrap();

        let done = wait_operation_complete(&api, &event.request_token, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(done.status, SUCCESS);
        assert_eq!(done.identifier.as_deref(), Some("id-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_wait_times_out_while_resource_remains() {
        let api = FakeCloudControl::new();
        api.insert("AWS::EC2::RouteTable", "rtb-1", json!({"RouteTableId": "rtb-1"}));

        let def = ec2_route_table::definition();
        let err = wait_resource_deleted(&api, &def, "rtb-1", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.message.contains("waiting for ec2_route_table (rtb-1) to be deleted"));
    }

    #[tokio::test(start_paused = true)]
    async fn existence_wait_gives_up_after_not_found_checks() {
        let api = FakeCloudControl::new();
        let mut def = ec2_route_table::definition();
        def.lifecycle = def.lifecycle.with_not_found_checks(2);

        let err = wait_resource_exists(&api, &def, "rtb-missing", Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(api.calls("GetResource"), 3);
    }
}
