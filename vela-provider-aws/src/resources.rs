//! Resource kind configurations for the AWS Cloud Control API
//!
//! Maps vela resource kinds to CloudFormation type names and attribute
//! names. Attributes with provider-side structure (firewall rules, policy
//! documents, launch template data) are handled by the special-case
//! builders in the provider module and do not appear in the mapping
//! tables here.

/// Attribute mapping: (vela name, AWS property name)
pub type AttrMapping = (&'static str, &'static str);

/// Resource kind configuration
pub struct ResourceConfig {
    /// AWS CloudFormation type name (e.g., "AWS::EC2::SecurityGroup")
    pub aws_type_name: &'static str,
    /// Plain attribute mappings (vela name -> AWS property name)
    pub attributes: &'static [AttrMapping],
    /// Attributes sent on create but never readable back from the
    /// provider (credential material). Reads echo the declared value so
    /// plans stay idempotent without diffing secrets against the store.
    pub write_only: &'static [&'static str],
    /// Whether the kind supports in-place updates via JSON patch
    pub supports_update: bool,
}

pub const VPC_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::EC2::VPC",
    attributes: &[("default", "IsDefault")],
    write_only: &[],
    supports_update: false,
};

pub const SUBNETS_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::EC2::Subnet",
    attributes: &[("vpc_id", "VpcId")],
    write_only: &[],
    supports_update: false,
};

pub const SECURITY_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::EC2::SecurityGroup",
    attributes: &[
        ("description", "GroupDescription"),
        ("vpc_id", "VpcId"),
    ],
    write_only: &[],
    supports_update: true,
};

pub const RDS_INSTANCE_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::RDS::DBInstance",
    attributes: &[
        ("engine", "Engine"),
        ("engine_version", "EngineVersion"),
        ("instance_class", "DBInstanceClass"),
        ("allocated_storage", "AllocatedStorage"),
        ("db_name", "DBName"),
        ("username", "MasterUsername"),
        ("password", "MasterUserPassword"),
        ("port", "Port"),
        ("publicly_accessible", "PubliclyAccessible"),
        ("vpc_security_group_ids", "VPCSecurityGroups"),
    ],
    // The reported engine version includes the patch level (8.0 -> 8.0.35),
    // so it is echoed rather than diffed against the store
    write_only: &["password", "engine_version"],
    supports_update: true,
};

pub const SECRET_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::SecretsManager::Secret",
    attributes: &[("description", "Description")],
    write_only: &[],
    supports_update: true,
};

/// The secret version has no Cloud Control type of its own: creating one
/// patches SecretString on the referenced secret, and versioning is the
/// store's responsibility. Deleting a version is a no-op.
pub const SECRET_VERSION_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::SecretsManager::Secret",
    attributes: &[],
    write_only: &["secret_string", "secret_id"],
    supports_update: true,
};

pub const IAM_ROLE_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::IAM::Role",
    attributes: &[],
    write_only: &[],
    supports_update: true,
};

pub const IAM_ROLE_POLICY_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::IAM::RolePolicy",
    attributes: &[],
    write_only: &[],
    supports_update: true,
};

pub const IAM_INSTANCE_PROFILE_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::IAM::InstanceProfile",
    attributes: &[],
    write_only: &[],
    supports_update: false,
};

pub const LOAD_BALANCER_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::ElasticLoadBalancingV2::LoadBalancer",
    attributes: &[
        ("subnet_ids", "Subnets"),
        ("security_group_ids", "SecurityGroups"),
    ],
    write_only: &[],
    supports_update: true,
};

pub const TARGET_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::ElasticLoadBalancingV2::TargetGroup",
    attributes: &[
        ("vpc_id", "VpcId"),
        ("port", "Port"),
        ("protocol", "Protocol"),
        ("health_check_path", "HealthCheckPath"),
        ("health_check_interval", "HealthCheckIntervalSeconds"),
        ("healthy_threshold", "HealthyThresholdCount"),
        ("unhealthy_threshold", "UnhealthyThresholdCount"),
    ],
    write_only: &[],
    supports_update: true,
};

pub const LISTENER_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::ElasticLoadBalancingV2::Listener",
    attributes: &[
        ("load_balancer_arn", "LoadBalancerArn"),
        ("port", "Port"),
        ("protocol", "Protocol"),
    ],
    write_only: &[],
    supports_update: true,
};

pub const LAUNCH_TEMPLATE_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::EC2::LaunchTemplate",
    attributes: &[],
    write_only: &[],
    supports_update: false,
};

pub const AUTOSCALING_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    aws_type_name: "AWS::AutoScaling::AutoScalingGroup",
    attributes: &[
        ("min_size", "MinSize"),
        ("max_size", "MaxSize"),
        ("desired_capacity", "DesiredCapacity"),
        ("target_group_arns", "TargetGroupARNs"),
        ("health_check_type", "HealthCheckType"),
        ("health_check_grace_period", "HealthCheckGracePeriod"),
    ],
    write_only: &[],
    supports_update: true,
};

/// Get resource configuration by vela kind name
pub fn get_resource_config(kind: &str) -> Option<&'static ResourceConfig> {
    match kind {
        "vpc" => Some(&VPC_CONFIG),
        "subnets" => Some(&SUBNETS_CONFIG),
        "security_group" => Some(&SECURITY_GROUP_CONFIG),
        "rds_instance" => Some(&RDS_INSTANCE_CONFIG),
        "secret" => Some(&SECRET_CONFIG),
        "secret_version" => Some(&SECRET_VERSION_CONFIG),
        "iam_role" => Some(&IAM_ROLE_CONFIG),
        "iam_role_policy" => Some(&IAM_ROLE_POLICY_CONFIG),
        "iam_instance_profile" => Some(&IAM_INSTANCE_PROFILE_CONFIG),
        "load_balancer" => Some(&LOAD_BALANCER_CONFIG),
        "target_group" => Some(&TARGET_GROUP_CONFIG),
        "listener" => Some(&LISTENER_CONFIG),
        "launch_template" => Some(&LAUNCH_TEMPLATE_CONFIG),
        "autoscaling_group" => Some(&AUTOSCALING_GROUP_CONFIG),
        _ => None,
    }
}
