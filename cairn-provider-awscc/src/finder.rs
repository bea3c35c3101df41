//! Finders over Cloud Control reads

use cairn_core::provider::{ProviderError, ProviderResult};

use crate::api::{CloudControlApi, RESOURCE_NOT_FOUND};

/// Properties of the resource, or the NotFound sentinel when Cloud Control
/// does not know the identifier or returns no properties for it
pub async fn find_resource_by_id(
    api: &dyn CloudControlApi,
    type_name: &str,
    identifier: &str,
) -> ProviderResult<serde_json::Value> {
    match api.get_resource(type_name, identifier).await {
        Ok(Some(properties)) => Ok(properties),
        Ok(None) => Err(ProviderError::not_found(format!(
            "{} ({}): empty result",
            type_name, identifier
        ))),
        Err(e) if e.code() == Some(RESOURCE_NOT_FOUND) => {
            let message = format!("{} ({}) not found", type_name, identifier);
            Err(ProviderError::not_found(message).with_cause(e))
        }
        Err(e) => Err(e),
    }
}
