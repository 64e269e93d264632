//! Graph - Dependency analysis and ordering for resource declarations
//!
//! References between resources (`Value::Ref`) form implicit edges; a
//! resource's `depends_on` list adds explicit same-layer ordering overrides.
//! The apply order must serialize along both kinds of edge.

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, Value};

/// Dependency between resources
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Target resource binding name
    pub target: String,
    /// Referenced attribute (e.g., "id"); empty for explicit overrides
    pub attribute: String,
    /// Where this reference is used (e.g., "source_security_group_id", or
    /// "depends_on" for explicit overrides)
    pub used_in: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Dependency cycle involving '{0}'")]
    Cycle(String),

    #[error("'{from}' references unknown binding '{target}'")]
    UnknownTarget { from: String, target: String },
}

/// Dependency graph over resource bindings
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource binding name -> list of dependencies
    pub edges: HashMap<String, Vec<Dependency>>,
    /// Reverse edges: target -> list of bindings that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,
    /// Bindings in declaration order (for stable ordering)
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from resource declarations
    ///
    /// Every reference and explicit override must point at a declared
    /// binding.
    pub fn from_resources(resources: &[Resource]) -> Result<Self, GraphError> {
        let bindings: HashSet<&str> = resources.iter().map(|r| r.binding.as_str()).collect();
        let mut graph = Self::new();

        for resource in resources {
            graph.order.push(resource.binding.clone());

            for (used_in, value) in &resource.attributes {
                for (target, attribute) in collect_refs(value) {
                    if !bindings.contains(target.as_str()) {
                        return Err(GraphError::UnknownTarget {
                            from: resource.binding.clone(),
                            target,
                        });
                    }
                    graph.add_edge(
                        resource.binding.clone(),
                        Dependency {
                            target,
                            attribute,
                            used_in: used_in.clone(),
                        },
                    );
                }
            }

            for target in &resource.depends_on {
                if !bindings.contains(target.as_str()) {
                    return Err(GraphError::UnknownTarget {
                        from: resource.binding.clone(),
                        target: target.clone(),
                    });
                }
                graph.add_edge(
                    resource.binding.clone(),
                    Dependency {
                        target: target.clone(),
                        attribute: String::new(),
                        used_in: "depends_on".to_string(),
                    },
                );
            }
        }

        Ok(graph)
    }

    /// Add a dependency edge
    pub fn add_edge(&mut self, from: String, dependency: Dependency) {
        let target = dependency.target.clone();
        self.edges.entry(from.clone()).or_default().push(dependency);
        self.reverse_edges.entry(target).or_default().push(from);
    }

    /// Get direct dependencies of a resource
    pub fn dependencies_of(&self, binding: &str) -> &[Dependency] {
        self.edges.get(binding).map_or(&[], |v| v.as_slice())
    }

    /// Get resources that depend on this resource
    pub fn dependents_of(&self, binding: &str) -> &[String] {
        self.reverse_edges
            .get(binding)
            .map_or(&[], |v| v.as_slice())
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Dependencies-first order over all bindings
    ///
    /// Stable: independent resources keep their declaration order.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut sorted = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut visiting: HashSet<String> = HashSet::new();

        for binding in &self.order {
            self.visit(binding, &mut visited, &mut visiting, &mut sorted)?;
        }

        Ok(sorted)
    }

    fn visit(
        &self,
        binding: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        sorted: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if visited.contains(binding) {
            return Ok(());
        }
        if visiting.contains(binding) {
            return Err(GraphError::Cycle(binding.to_string()));
        }

        visiting.insert(binding.to_string());

        for dep in self.dependencies_of(binding) {
            self.visit(&dep.target, visited, visiting, sorted)?;
        }

        visiting.remove(binding);
        visited.insert(binding.to_string());
        sorted.push(binding.to_string());
        Ok(())
    }
}

/// Sort resources so every resource comes after everything it depends on
pub fn sort_resources(resources: &[Resource]) -> Result<Vec<Resource>, GraphError> {
    let graph = DependencyGraph::from_resources(resources)?;
    let order = graph.topological_order()?;

    let by_binding: HashMap<&str, &Resource> =
        resources.iter().map(|r| (r.binding.as_str(), r)).collect();

    Ok(order
        .iter()
        .filter_map(|b| by_binding.get(b.as_str()).map(|r| (*r).clone()))
        .collect())
}

/// Collect (binding, attribute) pairs referenced by a value
fn collect_refs(value: &Value) -> Vec<(String, String)> {
    let mut refs = Vec::new();
    collect_refs_into(value, &mut refs);
    refs
}

fn collect_refs_into(value: &Value, refs: &mut Vec<(String, String)>) {
    match value {
        Value::Ref(binding, attribute) => {
            refs.push((binding.clone(), attribute.clone()));
        }
        Value::List(items) => {
            for item in items {
                collect_refs_into(item, refs);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_refs_into(v, refs);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Resource> {
        vec![
            Resource::new("security_group", "edge").with_binding("edge_sg"),
            Resource::new("security_group", "app")
                .with_binding("app_sg")
                .with_attribute(
                    "source_security_group_id",
                    Value::reference("edge_sg", "id"),
                ),
            Resource::new("security_group", "db")
                .with_binding("db_sg")
                .with_attribute(
                    "source_security_group_id",
                    Value::reference("app_sg", "id"),
                ),
        ]
    }

    #[test]
    fn reference_edges_are_collected() {
        let graph = DependencyGraph::from_resources(&chain()).unwrap();

        let deps = graph.dependencies_of("db_sg");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target, "app_sg");
        assert_eq!(deps[0].attribute, "id");
        assert_eq!(deps[0].used_in, "source_security_group_id");

        assert_eq!(graph.dependents_of("edge_sg"), &["app_sg".to_string()]);
    }

    #[test]
    fn topological_order_respects_references() {
        // Declare out of order on purpose
        let mut resources = chain();
        resources.reverse();

        let sorted = sort_resources(&resources).unwrap();
        let bindings: Vec<&str> = sorted.iter().map(|r| r.binding.as_str()).collect();
        assert_eq!(bindings, vec!["edge_sg", "app_sg", "db_sg"]);
    }

    #[test]
    fn explicit_depends_on_is_a_hard_edge() {
        // No attribute reference connects the group to the secret version;
        // only the explicit override does.
        let resources = vec![
            Resource::new("autoscaling_group", "fleet").with_depends_on("secret_version"),
            Resource::new("secret_version", "secret_version"),
        ];

        let sorted = sort_resources(&resources).unwrap();
        let bindings: Vec<&str> = sorted.iter().map(|r| r.binding.as_str()).collect();
        assert_eq!(bindings, vec!["secret_version", "fleet"]);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let resources = vec![
            Resource::new("listener", "http")
                .with_attribute("target_group_arn", Value::reference("tg", "arn")),
        ];

        match DependencyGraph::from_resources(&resources) {
            Err(GraphError::UnknownTarget { from, target }) => {
                assert_eq!(from, "http");
                assert_eq!(target, "tg");
            }
            other => panic!("Expected UnknownTarget, got {:?}", other),
        }
    }

    #[test]
    fn cycle_is_detected() {
        let resources = vec![
            Resource::new("a", "a").with_attribute("x", Value::reference("b", "id")),
            Resource::new("b", "b").with_attribute("x", Value::reference("a", "id")),
        ];

        let graph = DependencyGraph::from_resources(&resources).unwrap();
        assert!(graph.has_cycle());
        assert!(matches!(
            graph.topological_order(),
            Err(GraphError::Cycle(_))
        ));
    }

    #[test]
    fn refs_inside_lists_and_maps_are_found() {
        let resources = vec![
            Resource::new("subnets", "subnets").with_read_only(true),
            Resource::new("load_balancer", "lb").with_attribute(
                "subnet_ids",
                Value::List(vec![Value::reference("subnets", "ids")]),
            ),
        ];

        let graph = DependencyGraph::from_resources(&resources).unwrap();
        assert_eq!(graph.dependencies_of("lb")[0].target, "subnets");
    }

    #[test]
    fn independent_resources_keep_declaration_order() {
        let resources = vec![
            Resource::new("secret", "one"),
            Resource::new("secret", "two"),
            Resource::new("secret", "three"),
        ];

        let sorted = sort_resources(&resources).unwrap();
        let names: Vec<&str> = sorted.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
    }
}
