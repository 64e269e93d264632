//! Vela AWS Provider
//!
//! Implements `vela_core::provider::Provider` over the AWS Cloud Control
//! API: one generic create/read/update/delete surface for every resource
//! kind the topology declares, plus lookups for the network data sources.

pub mod convert;
pub mod provider;
pub mod resources;

pub use provider::AwsProvider;
