//! Deployment configuration
//!
//! The operator-facing input: a JSON file describing the application, its
//! images, the database, scaling bounds, and the health check contract.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

/// Top-level deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Application name; prefixes every resource name
    pub app: String,
    /// Provider region for all managed resources
    pub region: String,
    /// Container image reference the fleet runs
    pub image: String,
    /// Machine image id for the instances (e.g., "ami-0abc...")
    pub machine_image: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// Edge-facing service port, published 1:1 by the container
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    /// Where to keep the state file
    #[serde(default)]
    pub state: StateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    /// Initial database name
    pub name: String,
    pub user: String,
    pub port: u16,
    pub allocated_storage_gb: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "mysql".to_string(),
            engine_version: "8.0".to_string(),
            instance_class: "db.t3.micro".to_string(),
            name: "appdb".to_string(),
            user: "appuser".to_string(),
            port: 3306,
            allocated_storage_gb: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub min: i64,
    pub max: i64,
    pub desired: i64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 3,
            desired: 1,
        }
    }
}

/// Provider-native health check settings: HTTP GET on `path`, success is
/// HTTP 200
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub path: String,
    pub interval_secs: i64,
    pub healthy_threshold: i64,
    pub unhealthy_threshold: i64,
    /// Window a fresh instance gets to become healthy before it is cycled
    pub grace_period_secs: i64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: "/license.txt".to_string(),
            interval_secs: 30,
            healthy_threshold: 2,
            unhealthy_threshold: 2,
            grace_period_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// "local" or "s3"
    pub backend: String,
    /// Local backend: state file path
    pub path: Option<String>,
    /// S3 backend: bucket and object key
    pub bucket: Option<String>,
    pub key: Option<String>,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            path: None,
            bucket: None,
            key: None,
        }
    }
}

fn default_instance_type() -> String {
    "t3.micro".to_string()
}

fn default_service_port() -> u16 {
    80
}

fn app_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]{0,30}$").unwrap())
}

fn region_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").unwrap())
}

impl DeploymentConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field-level constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !app_name_re().is_match(&self.app) {
            errors.push(format!(
                "app '{}' must match {}",
                self.app,
                app_name_re().as_str()
            ));
        }
        if !region_re().is_match(&self.region) {
            errors.push(format!("region '{}' is not a valid region name", self.region));
        }
        if self.image.is_empty() {
            errors.push("image must not be empty".to_string());
        }
        if self.machine_image.is_empty() {
            errors.push("machine_image must not be empty".to_string());
        }
        if self.service_port == 0 {
            errors.push("service_port must be nonzero".to_string());
        }

        let s = &self.scaling;
        if s.min < 0 || s.max < 1 || !(s.min <= s.desired && s.desired <= s.max) {
            errors.push(format!(
                "scaling must satisfy 0 <= min <= desired <= max (got min={}, desired={}, max={})",
                s.min, s.desired, s.max
            ));
        }

        let h = &self.health_check;
        if !h.path.starts_with('/') {
            errors.push(format!("health_check.path '{}' must start with '/'", h.path));
        }
        if h.interval_secs < 5 {
            errors.push("health_check.interval_secs must be at least 5".to_string());
        }
        if h.healthy_threshold < 2 || h.unhealthy_threshold < 2 {
            errors.push("health_check thresholds must be at least 2".to_string());
        }
        if h.grace_period_secs < h.interval_secs {
            errors.push(
                "health_check.grace_period_secs must be at least one interval".to_string(),
            );
        }

        match self.state.backend.as_str() {
            "local" => {}
            "s3" => {
                if self.state.bucket.is_none() || self.state.key.is_none() {
                    errors.push("state backend 's3' requires bucket and key".to_string());
                }
            }
            other => errors.push(format!("unknown state backend '{}'", other)),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
