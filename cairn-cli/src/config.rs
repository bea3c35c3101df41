//! Configuration file loading
//!
//! ```json
//! {
//!   "provider": { "region": "us-east-1", "default_tags": { "Env": "dev" } },
//!   "backend": { "path": "cairn.state.json" },
//!   "resources": [
//!     { "type": "ec2_vpc", "name": "main", "attributes": { "cidr_block": "10.0.0.0/16" } },
//!     {
//!       "type": "ec2_subnet",
//!       "name": "a",
//!       "attributes": { "vpc_id": "${main.id}", "cidr_block": "10.0.1.0/24" },
//!       "timeouts": { "delete": "30m" }
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use cairn_core::resource::{Resource, Value};
use cairn_core::timeouts::Timeouts;
use cairn_provider_awscc::AwsccProviderConfig;
use cairn_state::LocalBackend;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub provider: AwsccProviderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// State file, relative to the configuration file
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub timeouts: serde_json::Value,
}

impl ResourceConfig {
    fn to_resource(&self) -> Result<Resource, String> {
        let timeouts = Timeouts::from_json(&self.timeouts)
            .map_err(|e| format!("{}.{}: {}", self.resource_type, self.name, e))?;

        let mut resource = Resource::new(&self.resource_type, &self.name).with_timeouts(timeouts);
        for (key, json) in &self.attributes {
            if let Some(value) = Value::from_json(json) {
                resource.attributes.insert(key.clone(), value);
            }
        }
        Ok(resource)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let mut config = Self::parse(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

        if let Some(state_path) = &config.backend.path
            && state_path.is_relative()
            && let Some(dir) = path.parent()
        {
            config.backend.path = Some(dir.join(state_path));
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let mut config: Config = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if config.provider.region.is_none() {
            config.provider.region = std::env::var("AWS_REGION").ok().filter(|r| !r.is_empty());
        }
        Ok(config)
    }

    /// Desired resources in declaration order
    pub fn resources(&self) -> Result<Vec<Resource>, String> {
        self.resources.iter().map(ResourceConfig::to_resource).collect()
    }

    /// `--state` wins over `backend.path`
    pub fn state_path(&self, state_override: Option<&Path>) -> PathBuf {
        state_override
            .map(Path::to_path_buf)
            .or_else(|| self.backend.path.clone())
            .unwrap_or_else(|| PathBuf::from(LocalBackend::DEFAULT_STATE_FILE))
    }
}
