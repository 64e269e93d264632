//! State file structures for persisting deployment state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of vela that last modified this state
    pub vela_version: String,
    /// All managed resources and their recorded state
    pub resources: Vec<ResourceState>,
    /// Apply outputs (e.g., the load balancer DNS name)
    #[serde(default)]
    pub outputs: HashMap<String, String>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            vela_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    /// Increment serial and update the tool version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.vela_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a resource by its binding name
    pub fn find_by_binding(&self, binding: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.binding == binding)
    }

    /// Find a resource by kind and name
    pub fn find_resource(&self, kind: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    /// Add or update a resource in the state, keyed by binding
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self
            .resources
            .iter_mut()
            .find(|r| r.binding == resource.binding)
        {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    /// Remove a resource from the state by binding
    pub fn remove_resource(&mut self, binding: &str) -> Option<ResourceState> {
        self.resources
            .iter()
            .position(|r| r.binding == binding)
            .map(|pos| self.resources.remove(pos))
    }

    /// Set an apply output
    pub fn set_output(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(key.into(), value.into());
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorded state of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource kind (e.g., "security_group", "rds_instance")
    pub kind: String,
    /// Resource name as it appears in the provider
    pub name: String,
    /// Binding name used for references between resources
    pub binding: String,
    /// Provider name (e.g., "aws")
    pub provider: String,
    /// Provider-internal identifier (e.g., sg-xxx, the secret ARN)
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            kind: kind.into(),
            binding: name.clone(),
            name,
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = binding.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Get a string attribute, if present and a string
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}
