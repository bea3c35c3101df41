//! Cloud Control API seam
//!
//! [`CloudControlApi`] is the narrow surface the provider needs from AWS Cloud
//! Control. [`SdkCloudControl`] implements it with the AWS SDK; tests swap in
//! an in-memory implementation.

use async_trait::async_trait;
use aws_config::Region;
use aws_config::retry::RetryConfig;
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudcontrol::types::ProgressEvent as SdkProgressEvent;
use cairn_core::provider::{ProviderError, ProviderResult};
use log::debug;

pub const PENDING: &str = "PENDING";
pub const IN_PROGRESS: &str = "IN_PROGRESS";
pub const SUCCESS: &str = "SUCCESS";
pub const FAILED: &str = "FAILED";
pub const CANCEL_IN_PROGRESS: &str = "CANCEL_IN_PROGRESS";
pub const CANCEL_COMPLETE: &str = "CANCEL_COMPLETE";

/// Error code of a get/delete against an identifier that does not exist
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
/// Handler error code of a failed operation on a missing resource
pub const HANDLER_NOT_FOUND: &str = "NotFound";
/// Handler error code used when a failed operation carries none
pub const GENERAL_SERVICE_EXCEPTION: &str = "GeneralServiceException";

/// Status of an asynchronous resource operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressEvent {
    pub request_token: String,
    pub identifier: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
    pub error_code: Option<String>,
}

impl ProgressEvent {
    fn from_sdk(event: &SdkProgressEvent) -> Self {
        Self {
            request_token: event.request_token().unwrap_or_default().to_string(),
            identifier: event.identifier().map(str::to_string),
            status: event
                .operation_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_message: event.status_message().map(str::to_string),
            error_code: event.error_code().map(|c| c.as_str().to_string()),
        }
    }
}

/// Operations against AWS Cloud Control
#[async_trait]
pub trait CloudControlApi: Send + Sync {
    /// Properties of a resource. `Ok(None)` means the API returned no
    /// properties; a missing resource is an error with code
    /// [`RESOURCE_NOT_FOUND`].
    async fn get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> ProviderResult<Option<serde_json::Value>>;

    async fn create_resource(
        &self,
        type_name: &str,
        desired_state: &serde_json::Value,
    ) -> ProviderResult<ProgressEvent>;

    /// Apply an RFC 6902 patch
    async fn update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch: &[serde_json::Value],
    ) -> ProviderResult<ProgressEvent>;

    async fn delete_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<ProgressEvent>;

    async fn get_request_status(&self, request_token: &str) -> ProviderResult<ProgressEvent>;
}

/// [`CloudControlApi`] backed by the AWS SDK
pub struct SdkCloudControl {
    client: CloudControlClient,
    region: Option<String>,
}

impl SdkCloudControl {
    /// Load credentials and region from the environment. `region` overrides
    /// the region found there (`AWS_REGION`, profile).
    pub async fn new(region: Option<&str>, max_retries: u32) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(max_retries.max(1)));
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        let region = config.region().map(|r| r.to_string());
        debug!("Cloud Control client for region {:?}", region);

        Self {
            client: CloudControlClient::new(&config),
            region,
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

fn api_error<E>(operation: &str, err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = match err.message() {
        Some(m) => m.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    ProviderError::api(code, format!("{}: {}", operation, message)).with_cause(err)
}

fn progress(operation: &str, event: Option<&SdkProgressEvent>) -> ProviderResult<ProgressEvent> {
    event
        .map(ProgressEvent::from_sdk)
        .ok_or_else(|| ProviderError::new(format!("{}: no progress event returned", operation)))
}

#[async_trait]
impl CloudControlApi for SdkCloudControl {
    async fn get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> ProviderResult<Option<serde_json::Value>> {
        let output = self
            .client
            .get_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| api_error("GetResource", e.into_service_error()))?;

        let Some(properties) = output.resource_description().and_then(|d| d.properties()) else {
            return Ok(None);
        };
        serde_json::from_str(properties).map(Some).map_err(|e| {
            ProviderError::new(format!("GetResource: invalid properties document: {}", e)).with_cause(e)
        })
    }

    async fn create_resource(
        &self,
        type_name: &str,
        desired_state: &serde_json::Value,
    ) -> ProviderResult<ProgressEvent> {
        let output = self
            .client
            .create_resource()
            .type_name(type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(|e| api_error("CreateResource", e.into_service_error()))?;
        progress("CreateResource", output.progress_event())
    }

    async fn update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch: &[serde_json::Value],
    ) -> ProviderResult<ProgressEvent> {
        let patch_document = serde_json::Value::Array(patch.to_vec()).to_string();
        let output = self
            .client
            .update_resource()
            .type_name(type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| api_error("UpdateResource", e.into_service_error()))?;
        progress("UpdateResource", output.progress_event())
    }

    async fn delete_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<ProgressEvent> {
        let output = self
            .client
            .delete_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| api_error("DeleteResource", e.into_service_error()))?;
        progress("DeleteResource", output.progress_event())
    }

    async fn get_request_status(&self, request_token: &str) -> ProviderResult<ProgressEvent> {
        let output = self
            .client
            .get_resource_request_status()
            .request_token(request_token)
            .send()
            .await
            .map_err(|e| api_error("GetResourceRequestStatus", e.into_service_error()))?;
        progress("GetResourceRequestStatus", output.progress_event())
    }
}
