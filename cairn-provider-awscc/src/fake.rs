//! In-memory Cloud Control for provider tests
//!
//! Mutations are applied when requested; their request tokens report
//! `IN_PROGRESS` once and then `SUCCESS`, or `FAILED` for scripted failures.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cairn_core::provider::{ProviderError, ProviderResult};
use serde_json::Value as Json;

use crate::api::{CloudControlApi, FAILED, IN_PROGRESS, ProgressEvent, RESOURCE_NOT_FOUND, SUCCESS};

struct Request {
    event: ProgressEvent,
    polled: bool,
}

#[derive(Default)]
struct Inner {
    resources: HashMap<(String, String), Json>,
    requests: HashMap<String, Request>,
    next_id: u32,
    create_failures: VecDeque<(String, String)>,
    hidden_reads: u32,
    read_delay: Duration,
    calls: Vec<String>,
    patches: Vec<Vec<Json>>,
}

#[derive(Default)]
pub struct FakeCloudControl {
    inner: Mutex<Inner>,
}

fn identifier_property(type_name: &str) -> &'static str {
    match type_name {
        "AWS::EC2::VPC" => "VpcId",
        "AWS::EC2::Subnet" => "SubnetId",
        "AWS::EC2::InternetGateway" => "InternetGatewayId",
        "AWS::EC2::RouteTable" => "RouteTableId",
        "AWS::EC2::NatGateway" => "NatGatewayId",
        "AWS::IAM::Role" => "RoleName",
        "AWS::Lambda::Function" => "FunctionName",
        _ => "Id",
    }
}

fn not_found(type_name: &str, identifier: &str) -> ProviderError {
    ProviderError::api(
        RESOURCE_NOT_FOUND,
        format!("Resource of type '{}' with identifier '{}' was not found.", type_name, identifier),
    )
}

impl FakeCloudControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next create with a handler error
    pub fn fail_next_create(&self, code: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .create_failures
            .push_back((code.to_string(), message.to_string()));
    }

    /// Report the next `n` reads as not found, as right after a create
    pub fn hide_next_reads(&self, n: u32) {
        self.inner.lock().unwrap().hidden_reads = n;
    }

    /// Make every read take `delay` to answer
    pub fn delay_reads(&self, delay: Duration) {
        self.inner.lock().unwrap().read_delay = delay;
    }

    pub fn insert(&self, type_name: &str, identifier: &str, properties: Json) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .resources
            .insert((type_name.to_string(), identifier.to_string()), properties);
    }

    pub fn get(&self, type_name: &str, identifier: &str) -> Option<Json> {
        let inner = self.inner.lock().unwrap();
        inner
            .resources
            .get(&(type_name.to_string(), identifier.to_string()))
            .cloned()
    }

    /// Count of calls to an operation, e.g. "CreateResource"
    pub fn calls(&self, operation: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.iter().filter(|c| *c == operation).count()
    }

    pub fn last_patch(&self) -> Option<Vec<Json>> {
        self.inner.lock().unwrap().patches.last().cloned()
    }

    fn start(inner: &mut Inner, identifier: Option<String>, failure: Option<(String, String)>) -> ProgressEvent {
        inner.next_id += 1;
        let token = format!("token-{}", inner.next_id);
        let event = match failure {
            Some((code, message)) => ProgressEvent {
                request_token: token.clone(),
                identifier,
                status: FAILED.to_string(),
                status_message: Some(message),
                error_code: Some(code),
            },
            None => ProgressEvent {
                request_token: token.clone(),
                identifier,
                status: SUCCESS.to_string(),
                status_message: None,
                error_code: None,
            },
        };
        inner.requests.insert(
            token.clone(),
            Request {
                event: event.clone(),
                polled: false,
            },
        );
        ProgressEvent {
            status: IN_PROGRESS.to_string(),
            ..event
        }
    }
}

#[async_trait]
impl CloudControlApi for FakeCloudControl {
    async fn get_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<Option<Json>> {
        let delay = self.inner.lock().unwrap().read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("GetResource".to_string());
        if inner.hidden_reads > 0 {
            inner.hidden_reads -= 1;
            return Err(not_found(type_name, identifier));
        }
        inner
            .resources
            .get(&(type_name.to_string(), identifier.to_string()))
            .cloned()
            .map(Some)
            .ok_or_else(|| not_found(type_name, identifier))
    }

    async fn create_resource(&self, type_name: &str, desired_state: &Json) -> ProviderResult<ProgressEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("CreateResource".to_string());

        if let Some(failure) = inner.create_failures.pop_front() {
            return Ok(Self::start(&mut inner, None, Some(failure)));
        }

        let property = identifier_property(type_name);
        let identifier = match desired_state.get(property).and_then(Json::as_str) {
            Some(id) => id.to_string(),
            None => format!("id-{}", inner.next_id + 1),
        };
        let mut properties = desired_state.clone();
        if let Some(object) = properties.as_object_mut() {
            object.insert(property.to_string(), Json::String(identifier.clone()));
        }
        inner
            .resources
            .insert((type_name.to_string(), identifier.clone()), properties);
        Ok(Self::start(&mut inner, Some(identifier), None))
    }

    async fn update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch: &[Json],
    ) -> ProviderResult<ProgressEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("UpdateResource".to_string());
        inner.patches.push(patch.to_vec());

        let key = (type_name.to_string(), identifier.to_string());
        let Some(object) = inner.resources.get_mut(&key).and_then(Json::as_object_mut) else {
            return Err(not_found(type_name, identifier));
        };
        for op in patch {
            let path = op["path"].as_str().unwrap_or_default().trim_start_matches('/').to_string();
            match op["op"].as_str() {
                Some("remove") => {
                    object.remove(&path);
                }
                _ => {
                    object.insert(path, op["value"].clone());
                }
            }
        }
        Ok(Self::start(&mut inner, Some(identifier.to_string()), None))
    }

    async fn delete_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<ProgressEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("DeleteResource".to_string());
        let key = (type_name.to_string(), identifier.to_string());
        if inner.resources.remove(&key).is_none() {
            return Err(not_found(type_name, identifier));
        }
        Ok(Self::start(&mut inner, Some(identifier.to_string()), None))
    }

    async fn get_request_status(&self, request_token: &str) -> ProviderResult<ProgressEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("GetResourceRequestStatus".to_string());
        let Some(request) = inner.requests.get_mut(request_token) else {
            return Err(ProviderError::api(
                "RequestTokenNotFoundException",
                format!("Request with token {} was not found", request_token),
            ));
        };
        if !request.polled {
            request.polled = true;
            return Ok(ProgressEvent {
                status: IN_PROGRESS.to_string(),
                ..request.event.clone()
            });
        }
        Ok(request.event.clone())
    }
}
