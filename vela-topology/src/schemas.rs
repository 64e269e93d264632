//! Attribute schemas for the resource kinds the topology emits

use vela_core::resource::Value;
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Port number type (with validation)
pub fn port_number() -> AttributeType {
    AttributeType::Custom {
        name: "PortNumber".to_string(),
        validate: |value| {
            if let Value::Int(n) = value {
                if (1..=65535).contains(n) {
                    Ok(())
                } else {
                    Err("Port number must be between 1 and 65535".to_string())
                }
            } else {
                Err("Expected integer".to_string())
            }
        },
    }
}

/// Firewall rule type: protocol + port range + exactly one source
///
/// A rule's source is either a CIDR block or another security group's
/// identity, never both.
pub fn firewall_rule() -> AttributeType {
    AttributeType::Custom {
        name: "FirewallRule".to_string(),
        validate: |value| {
            let Value::Map(rule) = value else {
                return Err("Expected a rule map".to_string());
            };

            match rule.get("protocol") {
                Some(Value::String(p)) if ["tcp", "udp", "icmp", "all"].contains(&p.as_str()) => {}
                _ => return Err("protocol must be one of tcp, udp, icmp, all".to_string()),
            }
            for key in ["from_port", "to_port"] {
                match rule.get(key) {
                    Some(Value::Int(n)) if (0..=65535).contains(n) => {}
                    _ => return Err(format!("{} must be an integer between 0 and 65535", key)),
                }
            }

            let has_cidr = rule.contains_key("cidr");
            let has_group = rule.contains_key("source_security_group_id");
            if has_cidr == has_group {
                return Err(
                    "rule must have exactly one of cidr or source_security_group_id".to_string(),
                );
            }
            Ok(())
        },
    }
}

fn string() -> AttributeType {
    AttributeType::String
}

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn int() -> AttributeType {
    AttributeType::Int
}

fn required(t: AttributeType) -> AttributeSchema {
    AttributeSchema::required(t)
}

fn optional(t: AttributeType) -> AttributeSchema {
    AttributeSchema::optional(t)
}

fn http_protocol() -> AttributeType {
    AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()])
}

/// Schema for one resource kind, or None for kinds without one
pub fn schema_for(kind: &str) -> Option<ResourceSchema> {
    let schema = match kind {
        "vpc" => {
            ResourceSchema::new("vpc").with_attribute("default", optional(AttributeType::Bool))
        }

        "subnets" => ResourceSchema::new("subnets").with_attribute("vpc_id", required(string())),

        "security_group" => ResourceSchema::new("security_group")
            .with_attribute("description", required(string()))
            .with_attribute("vpc_id", required(string()))
            .with_attribute(
                "ingress",
                required(AttributeType::List(Box::new(firewall_rule()))),
            )
            .with_attribute(
                "egress",
                optional(AttributeType::List(Box::new(firewall_rule()))),
            ),

        "rds_instance" => ResourceSchema::new("rds_instance")
            .with_attribute("engine", required(string()))
            .with_attribute("engine_version", required(string()))
            .with_attribute("instance_class", required(string()))
            .with_attribute("allocated_storage", required(int()))
            .with_attribute("db_name", required(string()))
            .with_attribute("username", required(string()))
            .with_attribute("password", required(string()))
            .with_attribute("port", required(port_number()))
            .with_attribute("publicly_accessible", optional(AttributeType::Bool))
            .with_attribute("vpc_security_group_ids", required(string_list())),

        "secret" => ResourceSchema::new("secret")
            .with_attribute("description", optional(string())),

        "secret_version" => ResourceSchema::new("secret_version")
            .with_attribute("secret_id", required(string()))
            .with_attribute(
                "secret_string",
                required(AttributeType::Map(Box::new(AttributeType::String))),
            ),

        "iam_role" => ResourceSchema::new("iam_role")
            .with_attribute("assume_role_service", required(string())),

        "iam_role_policy" => ResourceSchema::new("iam_role_policy")
            .with_attribute("role", required(string()))
            .with_attribute(
                "statements",
                required(AttributeType::List(Box::new(AttributeType::Map(Box::new(
                    string_list(),
                ))))),
            ),

        "iam_instance_profile" => ResourceSchema::new("iam_instance_profile")
            .with_attribute("role", required(string())),

        "load_balancer" => ResourceSchema::new("load_balancer")
            .with_attribute("subnet_ids", required(string_list()))
            .with_attribute("security_group_ids", required(string_list())),

        "target_group" => ResourceSchema::new("target_group")
            .with_attribute("vpc_id", required(string()))
            .with_attribute("port", required(port_number()))
            .with_attribute("protocol", required(http_protocol()))
            .with_attribute("health_check_path", required(string()))
            .with_attribute("health_check_interval", required(int()))
            .with_attribute("healthy_threshold", required(int()))
            .with_attribute("unhealthy_threshold", required(int()))
            .with_attribute("matcher", required(string())),

        "listener" => ResourceSchema::new("listener")
            .with_attribute("load_balancer_arn", required(string()))
            .with_attribute("port", required(port_number()))
            .with_attribute("protocol", required(http_protocol()))
            .with_attribute("default_target_group_arn", required(string())),

        "launch_template" => ResourceSchema::new("launch_template")
            .with_attribute("image_id", required(string()))
            .with_attribute("instance_type", required(string()))
            .with_attribute("instance_profile", required(string()))
            .with_attribute("security_group_ids", required(string_list()))
            .with_attribute("user_data", required(string())),

        "autoscaling_group" => ResourceSchema::new("autoscaling_group")
            .with_attribute("min_size", required(int()))
            .with_attribute("max_size", required(int()))
            .with_attribute("desired_capacity", required(int()))
            .with_attribute("launch_template_id", required(string()))
            .with_attribute("subnet_ids", required(string_list()))
            .with_attribute("target_group_arns", required(string_list()))
            .with_attribute(
                "health_check_type",
                required(AttributeType::Enum(vec![
                    "EC2".to_string(),
                    "ELB".to_string(),
                ])),
            )
            .with_attribute("health_check_grace_period", required(int())),

        _ => return None,
    };

    Some(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn port_number_bounds() {
        let t = port_number();
        assert!(t.validate(&Value::Int(80)).is_ok());
        assert!(t.validate(&Value::Int(65535)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(70000)).is_err());
        assert!(t.validate(&Value::string("80")).is_err());
    }

    #[test]
    fn firewall_rule_requires_exactly_one_source() {
        let t = firewall_rule();

        let mut rule = HashMap::new();
        rule.insert("protocol".to_string(), Value::string("tcp"));
        rule.insert("from_port".to_string(), Value::Int(80));
        rule.insert("to_port".to_string(), Value::Int(80));

        // No source at all
        assert!(t.validate(&Value::Map(rule.clone())).is_err());

        rule.insert("cidr".to_string(), Value::string("0.0.0.0/0"));
        assert!(t.validate(&Value::Map(rule.clone())).is_ok());

        // Both sources
        rule.insert(
            "source_security_group_id".to_string(),
            Value::reference("edge_sg", "id"),
        );
        assert!(t.validate(&Value::Map(rule)).is_err());
    }

    #[test]
    fn firewall_rule_rejects_bad_protocol() {
        let t = firewall_rule();
        let mut rule = HashMap::new();
        rule.insert("protocol".to_string(), Value::string("gre"));
        rule.insert("from_port".to_string(), Value::Int(80));
        rule.insert("to_port".to_string(), Value::Int(80));
        rule.insert("cidr".to_string(), Value::string("0.0.0.0/0"));
        assert!(t.validate(&Value::Map(rule)).is_err());
    }

    #[test]
    fn unknown_kind_has_no_schema() {
        assert!(schema_for("spaceship").is_none());
    }

    #[test]
    fn every_topology_kind_has_a_schema() {
        for kind in [
            "vpc",
            "subnets",
            "security_group",
            "rds_instance",
            "secret",
            "secret_version",
            "iam_role",
            "iam_role_policy",
            "iam_instance_profile",
            "load_balancer",
            "target_group",
            "listener",
            "launch_template",
            "autoscaling_group",
        ] {
            assert!(schema_for(kind).is_some(), "no schema for {}", kind);
        }
    }
}
