//! Vela Topology
//!
//! Defines the one deployment topology vela manages: a load-balanced,
//! auto-scaling fleet of container-running instances behind a managed
//! relational database, with credentials brokered through a secret store.
//!
//! The topology is built as plain resource declarations
//! (`vela_core::resource::Resource`); nothing here talks to a cloud. The
//! pieces:
//!
//! - **DeploymentConfig**: the operator-supplied settings (app name, region,
//!   images, scaling bounds, health check)
//! - **SecretMaterial**: the generated database password, stable across
//!   applies
//! - **bootstrap**: renders the instance user-data script that turns a bare
//!   instance into a serving node
//! - **Topology**: the full resource graph plus declared outputs
//! - **validate**: structural checks (schemas, firewall tier chaining, the
//!   explicit secret-before-fleet ordering edge)

pub mod bootstrap;
pub mod config;
pub mod schemas;
pub mod secret;
pub mod topology;
pub mod validate;

pub use config::{ConfigError, DeploymentConfig};
pub use secret::SecretMaterial;
pub use topology::{OutputSpec, Topology};
pub use validate::{ValidationError, validate};
