//! Cairn AWS Cloud Control Provider
//!
//! AWS Cloud Control API Provider implementation.
//!
//! ## Module Structure
//!
//! - `api` - Cloud Control API seam and its AWS SDK implementation
//! - `resources` - Resource definitions and lifecycle settings
//! - `schemas` - One definition per supported resource type
//! - `expand` / `flatten` - Mapping between attributes and Cloud Control properties
//! - `finder` / `wait` - Reads, status functions and waiters
//! - `provider` - AwsccProvider CRUD handlers
//! - `utils` - Helper functions for name mapping and normalization

pub mod api;
pub mod expand;
pub mod finder;
pub mod flatten;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod utils;
pub mod wait;

#[cfg(test)]
mod fake;

// Re-export main types
pub use provider::{AwsccProvider, AwsccProviderConfig, ConfigError};
pub use resources::{Lifecycle, ResourceDefinition};

use cairn_core::provider::{BoxFuture, Provider, ProviderResult};
use cairn_core::resource::{Resource, ResourceId, State};
use cairn_core::schema::ResourceSchema;
use cairn_core::timeouts::Timeouts;

use api::CloudControlApi;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<A: CloudControlApi> Provider for AwsccProvider<A> {
    fn name(&self) -> &'static str {
        "awscc"
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        self.definitions()
            .into_iter()
            .map(|d| d.schema.clone())
            .collect()
    }

    fn normalize_desired(&self, resource: Resource) -> Resource {
        self.normalize_resource(resource)
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        let timeouts = *timeouts;
        Box::pin(async move { self.read_resource(&id, identifier.as_deref(), &timeouts).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeouts: &Timeouts,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let timeouts = *timeouts;
        Box::pin(async move { self.delete_resource(&id, &identifier, &timeouts).await })
    }
}
