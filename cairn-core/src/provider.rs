//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific infrastructure API.
//! It is responsible for converting Effects into actual API calls.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;
use crate::timeouts::Timeouts;

/// Category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote API rejected the call
    Api,
    /// The remote object does not exist
    NotFound,
    /// A waiter or retry budget ran out
    Timeout,
    /// The request was invalid before reaching the API
    Validation,
    Other,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    /// API error code (e.g., "ResourceNotFoundException", "Throttling")
    pub code: Option<String>,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] ", id.resource_type, id.name)?;
        }
        match self.code {
            Some(ref code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
            code: None,
            resource_id: None,
            cause: None,
        }
    }

    /// An error returned by the remote API with its error code
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Api,
            code: Some(code.into()),
            ..Self::new(message)
        }
    }

    /// The "not found" sentinel
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            ..Self::new(message)
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            ..Self::new(message)
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            ..Self::new(message)
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Prefix the message with what was being attempted
    pub fn context(mut self, context: impl std::fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// True if this is an API error with `code` whose message contains `needle`
    pub fn code_and_message_contain(&self, code: &str, needle: &str) -> bool {
        self.code() == Some(code) && self.message.contains(needle)
    }

    pub fn message_contains(&self, needle: &str) -> bool {
        self.message.contains(needle)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
///
/// Each infrastructure provider implements this trait.
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "awscc")
    fn name(&self) -> &'static str;

    /// Schemas of the resource types this Provider can handle
    fn schemas(&self) -> Vec<ResourceSchema>;

    /// Rewrite a desired resource into the form reads report it in, before
    /// it is diffed (e.g., dropping values a provider-wide default supplies)
    fn normalize_desired(&self, resource: Resource) -> Resource {
        resource
    }

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist or no
    /// identifier is known.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource and wait until it is usable
    ///
    /// Returns State with identifier set to the provider-side ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource and wait until it is gone
    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<()>>;

    /// Adopt an existing remote object under `id`
    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let state = self
                .read(&id, Some(&identifier), &Timeouts::default())
                .await?;
            if !state.exists {
                return Err(ProviderError::not_found(format!(
                    "cannot import non-existent remote object '{}'",
                    identifier
                ))
                .for_resource(id));
            }
            Ok(state)
        })
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        (**self).schemas()
    }

    fn normalize_desired(&self, resource: Resource) -> Resource {
        (**self).normalize_desired(resource)
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier, timeouts)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier, timeouts)
    }

    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(id, identifier)
    }
}
