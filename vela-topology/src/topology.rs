//! Topology builder
//!
//! Emits the full resource graph for one deployment: network lookups, the
//! three firewall tiers, the managed database, the credential secret, the
//! compute identity, the load balancer, the launch template, and the
//! autoscaling group.

use std::collections::HashMap;

use vela_core::resource::{Resource, Value};

use crate::bootstrap;
use crate::config::DeploymentConfig;
use crate::secret::SecretMaterial;

/// A declared output: resolved after apply from a resource attribute
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub binding: String,
    pub attribute: String,
}

/// The complete deployment topology
#[derive(Debug, Clone)]
pub struct Topology {
    /// Resources in declaration order; apply order comes from the graph
    pub resources: Vec<Resource>,
    pub outputs: Vec<OutputSpec>,
}

impl Topology {
    /// Build the resource graph for a deployment
    pub fn build(config: &DeploymentConfig, secret: &SecretMaterial) -> Self {
        let app = &config.app;
        let port = config.service_port as i64;
        let db = &config.database;
        let secret_name = format!("{}/database", app);

        let mut resources = Vec::new();

        // Existing network context, looked up rather than created. An empty
        // lookup fails the apply before anything is mutated.
        resources.push(
            Resource::new("vpc", "default")
                .with_binding("vpc")
                .with_read_only(true)
                .with_attribute("default", Value::Bool(true)),
        );
        resources.push(
            Resource::new("subnets", format!("{}-subnets", app))
                .with_binding("subnets")
                .with_read_only(true)
                .with_attribute("vpc_id", Value::reference("vpc", "id")),
        );

        // Firewall tiers. Trust chains transitively: internet -> edge ->
        // app -> database.
        resources.push(
            Resource::new("security_group", format!("{}-edge", app))
                .with_binding("edge_sg")
                .with_attribute("description", Value::string("edge tier, internet-facing"))
                .with_attribute("vpc_id", Value::reference("vpc", "id"))
                .with_attribute(
                    "ingress",
                    Value::List(vec![rule_from_cidr("tcp", port, "0.0.0.0/0")]),
                )
                .with_attribute("egress", Value::List(vec![allow_all_egress()])),
        );
        resources.push(
            Resource::new("security_group", format!("{}-app", app))
                .with_binding("app_sg")
                .with_attribute("description", Value::string("app tier, edge traffic only"))
                .with_attribute("vpc_id", Value::reference("vpc", "id"))
                .with_attribute(
                    "ingress",
                    Value::List(vec![rule_from_group("tcp", port, "edge_sg")]),
                )
                .with_attribute("egress", Value::List(vec![allow_all_egress()])),
        );
        resources.push(
            Resource::new("security_group", format!("{}-db", app))
                .with_binding("db_sg")
                .with_attribute("description", Value::string("db tier, app traffic only"))
                .with_attribute("vpc_id", Value::reference("vpc", "id"))
                .with_attribute(
                    "ingress",
                    Value::List(vec![rule_from_group("tcp", db.port as i64, "app_sg")]),
                ),
        );

        // Managed database. Credentials are generated once and never rotated
        // by vela.
        resources.push(
            Resource::new("rds_instance", format!("{}-db", app))
                .with_binding("db")
                .with_attribute("engine", Value::string(&db.engine))
                .with_attribute("engine_version", Value::string(&db.engine_version))
                .with_attribute("instance_class", Value::string(&db.instance_class))
                .with_attribute("allocated_storage", Value::Int(db.allocated_storage_gb))
                .with_attribute("db_name", Value::string(&db.name))
                .with_attribute("username", Value::string(&db.user))
                .with_attribute("password", Value::string(&secret.password))
                .with_attribute("port", Value::Int(db.port as i64))
                .with_attribute("publicly_accessible", Value::Bool(false))
                .with_attribute(
                    "vpc_security_group_ids",
                    Value::List(vec![Value::reference("db_sg", "id")]),
                ),
        );

        // Credential bundle. The version references the database's live
        // endpoint, so it cannot exist before the database does.
        resources.push(
            Resource::new("secret", secret_name.clone())
                .with_binding("db_secret")
                .with_attribute("description", Value::string("database credentials")),
        );
        resources.push(
            Resource::new("secret_version", format!("{}-current", app))
                .with_binding("db_secret_version")
                .with_attribute("secret_id", Value::reference("db_secret", "id"))
                .with_attribute(
                    "secret_string",
                    Value::Map(HashMap::from([
                        ("DB_HOST".to_string(), Value::reference("db", "address")),
                        ("DB_USER".to_string(), Value::string(&db.user)),
                        ("DB_PASSWORD".to_string(), Value::string(&secret.password)),
                        ("DB_NAME".to_string(), Value::string(&db.name)),
                    ])),
                ),
        );

        // Compute identity: read one secret, describe own tags, nothing else.
        resources.push(
            Resource::new("iam_role", format!("{}-app", app))
                .with_binding("app_role")
                .with_attribute("assume_role_service", Value::string("ec2.amazonaws.com")),
        );
        resources.push(
            Resource::new("iam_role_policy", format!("{}-app-secret", app))
                .with_binding("app_policy")
                .with_attribute("role", Value::reference("app_role", "id"))
                .with_attribute(
                    "statements",
                    Value::List(vec![
                        Value::Map(HashMap::from([
                            (
                                "actions".to_string(),
                                Value::List(vec![Value::string("secretsmanager:GetSecretValue")]),
                            ),
                            (
                                "resources".to_string(),
                                Value::List(vec![Value::reference("db_secret", "arn")]),
                            ),
                        ])),
                        Value::Map(HashMap::from([
                            (
                                "actions".to_string(),
                                Value::List(vec![Value::string("ec2:DescribeTags")]),
                            ),
                            (
                                "resources".to_string(),
                                Value::List(vec![Value::string("*")]),
                            ),
                        ])),
                    ]),
                ),
        );
        resources.push(
            Resource::new("iam_instance_profile", format!("{}-app", app))
                .with_binding("app_profile")
                .with_attribute("role", Value::reference("app_role", "id")),
        );

        // Edge: load balancer, target group carrying the health check
        // contract, listener.
        resources.push(
            Resource::new("load_balancer", format!("{}-lb", app))
                .with_binding("lb")
                .with_attribute("subnet_ids", Value::reference("subnets", "ids"))
                .with_attribute(
                    "security_group_ids",
                    Value::List(vec![Value::reference("edge_sg", "id")]),
                ),
        );
        resources.push(
            Resource::new("target_group", format!("{}-tg", app))
                .with_binding("tg")
                .with_attribute("vpc_id", Value::reference("vpc", "id"))
                .with_attribute("port", Value::Int(port))
                .with_attribute("protocol", Value::string("HTTP"))
                .with_attribute(
                    "health_check_path",
                    Value::string(&config.health_check.path),
                )
                .with_attribute(
                    "health_check_interval",
                    Value::Int(config.health_check.interval_secs),
                )
                .with_attribute(
                    "healthy_threshold",
                    Value::Int(config.health_check.healthy_threshold),
                )
                .with_attribute(
                    "unhealthy_threshold",
                    Value::Int(config.health_check.unhealthy_threshold),
                )
                .with_attribute("matcher", Value::string("200")),
        );
        resources.push(
            Resource::new("listener", format!("{}-http", app))
                .with_binding("listener")
                .with_attribute("load_balancer_arn", Value::reference("lb", "arn"))
                .with_attribute("port", Value::Int(port))
                .with_attribute("protocol", Value::string("HTTP"))
                .with_attribute(
                    "default_target_group_arn",
                    Value::reference("tg", "arn"),
                ),
        );

        // Launch template: an immutable snapshot of everything an instance
        // needs. Any input change stamps a new template.
        let user_data = bootstrap::render(&secret_name, &config.image, config.service_port);
        let launch_template = Resource::new("launch_template", format!("{}-lt", app))
            .with_binding("launch_template")
            .with_attribute("image_id", Value::string(&config.machine_image))
            .with_attribute("instance_type", Value::string(&config.instance_type))
            .with_attribute("instance_profile", Value::reference("app_profile", "arn"))
            .with_attribute(
                "security_group_ids",
                Value::List(vec![Value::reference("app_sg", "id")]),
            )
            .with_attribute("user_data", Value::string(user_data))
            .with_replace_on("image_id")
            .with_replace_on("instance_type")
            .with_replace_on("instance_profile")
            .with_replace_on("security_group_ids")
            .with_replace_on("user_data");
        resources.push(launch_template);

        // The fleet. The explicit depends_on edge keeps instances from
        // booting before the secret record exists; nothing else orders these
        // two resources.
        resources.push(
            Resource::new("autoscaling_group", format!("{}-asg", app))
                .with_binding("asg")
                .with_attribute("min_size", Value::Int(config.scaling.min))
                .with_attribute("max_size", Value::Int(config.scaling.max))
                .with_attribute("desired_capacity", Value::Int(config.scaling.desired))
                .with_attribute(
                    "launch_template_id",
                    Value::reference("launch_template", "id"),
                )
                .with_attribute("subnet_ids", Value::reference("subnets", "ids"))
                .with_attribute(
                    "target_group_arns",
                    Value::List(vec![Value::reference("tg", "arn")]),
                )
                .with_attribute("health_check_type", Value::string("ELB"))
                .with_attribute(
                    "health_check_grace_period",
                    Value::Int(config.health_check.grace_period_secs),
                )
                .with_depends_on("db_secret_version"),
        );

        let outputs = vec![OutputSpec {
            name: "lb_dns_name".to_string(),
            binding: "lb".to_string(),
            attribute: "dns_name".to_string(),
        }];

        Topology { resources, outputs }
    }

    /// Find a resource by its binding name
    pub fn resource(&self, binding: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.binding == binding)
    }
}

fn rule_from_cidr(protocol: &str, port: i64, cidr: &str) -> Value {
    Value::Map(HashMap::from([
        ("protocol".to_string(), Value::string(protocol)),
        ("from_port".to_string(), Value::Int(port)),
        ("to_port".to_string(), Value::Int(port)),
        ("cidr".to_string(), Value::string(cidr)),
    ]))
}

fn rule_from_group(protocol: &str, port: i64, source_binding: &str) -> Value {
    Value::Map(HashMap::from([
        ("protocol".to_string(), Value::string(protocol)),
        ("from_port".to_string(), Value::Int(port)),
        ("to_port".to_string(), Value::Int(port)),
        (
            "source_security_group_id".to_string(),
            Value::reference(source_binding, "id"),
        ),
    ]))
}

fn allow_all_egress() -> Value {
    Value::Map(HashMap::from([
        ("protocol".to_string(), Value::string("all")),
        ("from_port".to_string(), Value::Int(0)),
        ("to_port".to_string(), Value::Int(0)),
        ("cidr".to_string(), Value::string("0.0.0.0/0")),
    ]))
}
