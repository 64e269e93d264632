//! Resource - Representing resource declarations and observed state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource kind (e.g., "security_group", "autoscaling_group")
    pub kind: String,
    /// Resource name as it appears in the provider (e.g., "myapp-edge")
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding name, attribute name).
    /// References are the implicit dependency edges of the graph and are
    /// resolved against applied state before the attribute reaches a provider.
    Ref(String, String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn reference(binding: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::Ref(binding.into(), attribute.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// Desired state of a single resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    /// Binding name other resources use to reference this one. Defaults to
    /// the resource name.
    pub binding: String,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (looked up, never mutated)
    pub read_only: bool,
    /// Explicit ordering overrides: bindings that must be applied before this
    /// resource even when no attribute reference forces it
    pub depends_on: Vec<String>,
    /// Attributes whose change forces destroy+recreate instead of an
    /// in-place update
    pub replace_on: Vec<String>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ResourceId::new(kind, name.clone()),
            binding: name,
            attributes: HashMap::new(),
            read_only: false,
            depends_on: Vec::new(),
            replace_on: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = binding.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_depends_on(mut self, binding: impl Into<String>) -> Self {
        self.depends_on.push(binding.into());
        self
    }

    pub fn with_replace_on(mut self, attribute: impl Into<String>) -> Self {
        self.replace_on.push(attribute.into());
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Current state observed from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub id: ResourceId,
    /// Provider-internal identifier (e.g., sg-xxx, the secret ARN)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl RemoteState {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_defaults_to_name() {
        let r = Resource::new("security_group", "myapp-edge");
        assert_eq!(r.binding, "myapp-edge");

        let r = r.with_binding("edge_sg");
        assert_eq!(r.binding, "edge_sg");
        assert_eq!(r.id.name, "myapp-edge");
    }

    #[test]
    fn data_source_flag() {
        let r = Resource::new("vpc", "default").with_read_only(true);
        assert!(r.is_data_source());
    }

    #[test]
    fn depends_on_and_replace_on_accumulate() {
        let r = Resource::new("autoscaling_group", "myapp")
            .with_depends_on("db_secret_version")
            .with_replace_on("user_data")
            .with_replace_on("image_id");

        assert_eq!(r.depends_on, vec!["db_secret_version"]);
        assert_eq!(r.replace_on, vec!["user_data", "image_id"]);
    }

    #[test]
    fn resource_id_display() {
        let id = ResourceId::new("rds_instance", "myapp-db");
        assert_eq!(id.to_string(), "rds_instance.myapp-db");
    }
}
