//! Structural validation of a built topology
//!
//! Runs before any plan is computed: schema checks per resource, the
//! firewall tier-chaining invariant, the explicit secret-before-fleet
//! ordering edge, and graph well-formedness.

use vela_core::graph::{DependencyGraph, GraphError};
use vela_core::resource::{Resource, Value};

use crate::schemas;
use crate::topology::Topology;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{resource}: {message}")]
    Schema { resource: String, message: String },

    #[error("'{binding}' must admit traffic only from '{expected_source}', found {found}")]
    OpenTier {
        binding: String,
        expected_source: String,
        found: String,
    },

    #[error("'asg' is missing its explicit dependency on 'db_secret_version'")]
    MissingOrderingEdge,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Validate a topology; returns every violation found
pub fn validate(topology: &Topology) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for resource in &topology.resources {
        if let Some(schema) = schemas::schema_for(&resource.id.kind)
            && let Err(schema_errors) = schema.validate(&resource.attributes)
        {
            for e in schema_errors {
                errors.push(ValidationError::Schema {
                    resource: resource.id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    // The access-control invariant: the app tier admits only the edge
    // tier's identity, the db tier only the app tier's.
    check_tier_source(topology, "app_sg", "edge_sg", &mut errors);
    check_tier_source(topology, "db_sg", "app_sg", &mut errors);

    match topology.resource("asg") {
        Some(asg) if asg.depends_on.contains(&"db_secret_version".to_string()) => {}
        _ => errors.push(ValidationError::MissingOrderingEdge),
    }

    match DependencyGraph::from_resources(&topology.resources) {
        Ok(graph) => {
            if let Err(e) = graph.topological_order() {
                errors.push(e.into());
            }
        }
        Err(e) => errors.push(e.into()),
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Every ingress rule of `binding` must source from `expected_source`'s
/// identity; a CIDR source here would open the tier to the network at large.
fn check_tier_source(
    topology: &Topology,
    binding: &str,
    expected_source: &str,
    errors: &mut Vec<ValidationError>,
) {
    let Some(resource) = topology.resource(binding) else {
        // Schema/missing-resource errors are reported elsewhere
        return;
    };

    for rule in ingress_rules(resource) {
        let found = match rule.get("source_security_group_id") {
            Some(Value::Ref(source, _)) if source == expected_source => continue,
            Some(Value::Ref(source, _)) => format!("a reference to '{}'", source),
            Some(_) => "a literal group id".to_string(),
            None => match rule.get("cidr") {
                Some(Value::String(cidr)) => format!("cidr {}", cidr),
                _ => "no source".to_string(),
            },
        };

        errors.push(ValidationError::OpenTier {
            binding: binding.to_string(),
            expected_source: expected_source.to_string(),
            found,
        });
    }
}

fn ingress_rules(resource: &Resource) -> Vec<&std::collections::HashMap<String, Value>> {
    match resource.attribute("ingress") {
        Some(Value::List(rules)) => rules
            .iter()
            .filter_map(|r| match r {
                Value::Map(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::secret::SecretMaterial;
    use crate::topology::Topology;
    use std::collections::HashMap;

    fn built() -> Topology {
        let config: DeploymentConfig = serde_json::from_value(serde_json::json!({
            "app": "myapp",
            "region": "eu-west-1",
            "image": "registry.example.com/myapp:1.4.2",
            "machine_image": "ami-0aabbccddeeff0011"
        }))
        .unwrap();
        let material = SecretMaterial {
            password: "fixed-test-password-0123456789ab".to_string(),
        };
        Topology::build(&config, &material)
    }

    #[test]
    fn built_topology_is_valid() {
        validate(&built()).unwrap();
    }

    #[test]
    fn internet_facing_app_tier_is_rejected() {
        let mut topology = built();

        let app_sg = topology
            .resources
            .iter_mut()
            .find(|r| r.binding == "app_sg")
            .unwrap();
        app_sg.attributes.insert(
            "ingress".to_string(),
            Value::List(vec![Value::Map(HashMap::from([
                ("protocol".to_string(), Value::string("tcp")),
                ("from_port".to_string(), Value::Int(80)),
                ("to_port".to_string(), Value::Int(80)),
                ("cidr".to_string(), Value::string("0.0.0.0/0")),
            ]))]),
        );

        let errors = validate(&topology).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::OpenTier { binding, .. } if binding == "app_sg"
        )));
    }

    #[test]
    fn db_tier_sourcing_from_edge_is_rejected() {
        let mut topology = built();

        let db_sg = topology
            .resources
            .iter_mut()
            .find(|r| r.binding == "db_sg")
            .unwrap();
        db_sg.attributes.insert(
            "ingress".to_string(),
            Value::List(vec![Value::Map(HashMap::from([
                ("protocol".to_string(), Value::string("tcp")),
                ("from_port".to_string(), Value::Int(3306)),
                ("to_port".to_string(), Value::Int(3306)),
                (
                    "source_security_group_id".to_string(),
                    Value::reference("edge_sg", "id"),
                ),
            ]))]),
        );

        let errors = validate(&topology).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::OpenTier { binding, found, .. }
                if binding == "db_sg" && found.contains("edge_sg")
        )));
    }

    #[test]
    fn missing_ordering_edge_is_rejected() {
        let mut topology = built();

        let asg = topology
            .resources
            .iter_mut()
            .find(|r| r.binding == "asg")
            .unwrap();
        asg.depends_on.clear();

        let errors = validate(&topology).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MissingOrderingEdge)));
    }

    #[test]
    fn schema_violation_is_reported_with_resource_name() {
        let mut topology = built();

        let tg = topology
            .resources
            .iter_mut()
            .find(|r| r.binding == "tg")
            .unwrap();
        tg.attributes.remove("health_check_path");

        let errors = validate(&topology).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::Schema { resource, message }
                if resource == "target_group.myapp-tg" && message.contains("health_check_path")
        )));
    }

    #[test]
    fn dangling_reference_is_a_graph_error() {
        let mut topology = built();
        topology.resources.retain(|r| r.binding != "db_secret");

        let errors = validate(&topology).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Graph(GraphError::UnknownTarget { .. }))));
    }
}
